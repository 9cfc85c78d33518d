use std::sync::Arc;

use ethers_core::types::{H160, H256, U256, U64};
use ethers_providers::Middleware;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    abi::{IErc20, IUniswapExchange},
    balances::BalanceBook,
    error::{CoreError, Result},
    ledger::TxId,
    removal::RemovalPlan,
    types::{ReserveSnapshot, TokenInfo, MAX_TOKEN_DECIMALS},
};

/// Raw on-chain reads. Failures surface as `ReadFailure` and are never retried here.
#[allow(async_fn_in_trait)]
pub trait ChainRead {
    async fn exchange_token(&self, exchange: H160) -> Result<H160>;
    async fn total_supply(&self, exchange: H160) -> Result<U256>;
    async fn eth_balance(&self, owner: H160) -> Result<U256>;
    async fn token_balance(&self, token: H160, owner: H160) -> Result<U256>;
    async fn token_info(&self, token: H160) -> Result<TokenInfo>;
    async fn latest_block_timestamp(&self) -> Result<u64>;
    /// `None` while the transaction has no receipt, otherwise whether it succeeded.
    async fn receipt_status(&self, hash: H256) -> Result<Option<bool>>;
}

#[allow(async_fn_in_trait)]
pub trait SubmitTransaction {
    async fn remove_liquidity(&self, from: H160, plan: &RemovalPlan, deadline: u64) -> Result<TxId>;
}

/// `ChainRead` and `SubmitTransaction` over an ethers middleware stack.
#[derive(Debug)]
pub struct ChainClient<M> {
    provider: Arc<M>,
}

impl<M> Clone for ChainClient<M> {
    fn clone(&self) -> Self {
        ChainClient {
            provider: self.provider.clone(),
        }
    }
}

impl<M: Middleware + 'static> ChainClient<M> {
    pub fn new(provider: Arc<M>) -> Self {
        ChainClient { provider }
    }
}

impl<M: Middleware + 'static> ChainRead for ChainClient<M> {
    async fn exchange_token(&self, exchange: H160) -> Result<H160> {
        IUniswapExchange::new(exchange, self.provider.clone())
            .token_address()
            .call()
            .await
            .map_err(|err| CoreError::read("tokenAddress", err))
    }

    async fn total_supply(&self, exchange: H160) -> Result<U256> {
        IUniswapExchange::new(exchange, self.provider.clone())
            .total_supply()
            .call()
            .await
            .map_err(|err| CoreError::read("totalSupply", err))
    }

    async fn eth_balance(&self, owner: H160) -> Result<U256> {
        self.provider
            .get_balance(owner, None)
            .await
            .map_err(|err| CoreError::read("getBalance", err))
    }

    async fn token_balance(&self, token: H160, owner: H160) -> Result<U256> {
        IErc20::new(token, self.provider.clone())
            .balance_of(owner)
            .call()
            .await
            .map_err(|err| CoreError::read("balanceOf", err))
    }

    async fn token_info(&self, token: H160) -> Result<TokenInfo> {
        let erc20 = IErc20::new(token, self.provider.clone());
        let decimals = erc20
            .decimals()
            .call()
            .await
            .map_err(|err| CoreError::read("decimals", err))?;
        let symbol = erc20
            .symbol()
            .call()
            .await
            .map_err(|err| CoreError::read("symbol", err))?;

        Ok(TokenInfo {
            address: token,
            symbol,
            decimals,
        })
    }

    async fn latest_block_timestamp(&self) -> Result<u64> {
        let number = self
            .provider
            .get_block_number()
            .await
            .map_err(|err| CoreError::read("getBlockNumber", err))?;
        let block = self
            .provider
            .get_block(number)
            .await
            .map_err(|err| CoreError::read("getBlock", err))?
            .ok_or_else(|| CoreError::read("getBlock", format!("block {number} not found")))?;

        timestamp_secs(block.timestamp)
    }

    async fn receipt_status(&self, hash: H256) -> Result<Option<bool>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|err| CoreError::read("getTransactionReceipt", err))?;

        Ok(receipt.map(|receipt| receipt.status == Some(U64::one())))
    }
}

impl<M: Middleware + 'static> SubmitTransaction for ChainClient<M> {
    async fn remove_liquidity(&self, from: H160, plan: &RemovalPlan, deadline: u64) -> Result<TxId> {
        let exchange = IUniswapExchange::new(plan.exchange, self.provider.clone());
        let call = exchange
            .remove_liquidity(plan.amount, plan.min_eth, plan.min_tokens, U256::from(deadline))
            .from(from);
        let pending = call
            .send()
            .await
            .map_err(|err| CoreError::SubmissionError(err.to_string()))?;

        Ok(TxId::from(pending.tx_hash()))
    }
}

fn timestamp_secs(timestamp: U256) -> Result<u64> {
    u64::try_from(timestamp).map_err(|_| CoreError::Overflow("block timestamp"))
}

/// Token metadata, read at most once per token for the life of the book.
pub async fn load_token_info<R: ChainRead>(
    reader: &R,
    book: &mut BalanceBook,
    token: H160,
) -> Result<TokenInfo> {
    if let Some(info) = book.token_info(token) {
        return Ok(info.clone());
    }
    let info = reader.token_info(token).await?;
    if info.decimals > MAX_TOKEN_DECIMALS {
        return Err(CoreError::read(
            "decimals",
            format!("unsupported token decimals {}", info.decimals),
        ));
    }
    debug!(token = ?token, symbol = %info.symbol, decimals = info.decimals, "cached token metadata");
    book.cache_token(info.clone());
    Ok(info)
}

pub async fn load_reserve_snapshot<R: ChainRead>(
    reader: &R,
    exchange: H160,
    token: &TokenInfo,
) -> Result<ReserveSnapshot> {
    let (eth_reserve, token_reserve, total_supply) = tokio::try_join!(
        reader.eth_balance(exchange),
        reader.token_balance(token.address, exchange),
        reader.total_supply(exchange),
    )?;

    Ok(ReserveSnapshot {
        exchange_address: exchange,
        token_address: token.address,
        eth_reserve,
        token_reserve,
        token_decimals: token.decimals,
        total_supply,
    })
}

/// Refreshes reserves for every exchange and, when given, the account's
/// ETH, token and liquidity balances. An exchange that fails to load loses
/// its old snapshot and the first failure is returned.
pub async fn refresh_book<R: ChainRead>(
    reader: &R,
    book: &mut BalanceBook,
    exchanges: &[H160],
    account: Option<H160>,
) -> Result<()> {
    let mut tokens = Vec::with_capacity(exchanges.len());
    for exchange in exchanges {
        let token = reader.exchange_token(*exchange).await?;
        let info = load_token_info(reader, book, token).await?;
        tokens.push((*exchange, info));
    }

    let snapshot_futs = tokens
        .iter()
        .map(|(exchange, info)| load_reserve_snapshot(reader, *exchange, info));
    let results = join_all(snapshot_futs).await;

    let mut first_error = None;
    for ((exchange, _), result) in tokens.iter().zip(results) {
        match result {
            Ok(snapshot) => book.apply_snapshot(snapshot),
            Err(err) => {
                warn!("Error loading reserve snapshot for {:?}: {}", exchange, err);
                book.remove_snapshot(*exchange);
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    if let Some(account) = account {
        book.set_eth_balance(account, reader.eth_balance(account).await?);
        for (exchange, info) in &tokens {
            let (liquidity, token_balance) = tokio::try_join!(
                reader.token_balance(*exchange, account),
                reader.token_balance(info.address, account),
            )?;
            book.set_token_balance(account, *exchange, liquidity);
            book.set_token_balance(account, info.address, token_balance);
        }
    }

    Ok(())
}
