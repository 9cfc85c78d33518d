use ethers::prelude::abigen;

abigen!(
    IUniswapExchange,
    r#"[
        function tokenAddress() external view returns (address)
        function totalSupply() external view returns (uint256)
        function balanceOf(address owner) external view returns (uint256)
        function removeLiquidity(uint256 amount, uint256 min_eth, uint256 min_tokens, uint256 deadline) external returns (uint256, uint256)
    ]"#
);

abigen!(
    IErc20,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
        function decimals() external view returns (uint8)
        function symbol() external view returns (string)
    ]"#
);
