use ethers_core::types::{H160, U256};
use serde::{Deserialize, Serialize};

use crate::fixed::format_units;

pub const ETH_DECIMALS: u8 = 18;
pub const ETH_LABEL: &str = "ETH";
/// Exchange contracts are their own liquidity token.
pub const LIQUIDITY_DECIMALS: u8 = 18;
pub const LIQUIDITY_LABEL: &str = "UNI-V1";
/// Past this a whole token no longer fits in a `U256`.
pub const MAX_TOKEN_DECIMALS: u8 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: H160,
    pub symbol: String,
    pub decimals: u8,
}

/// Latest reads for one exchange. Never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    pub exchange_address: H160,
    pub token_address: H160,
    pub eth_reserve: U256,
    pub token_reserve: U256,
    pub token_decimals: u8,
    pub total_supply: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRecord {
    /// In the token's smallest unit.
    pub value: U256,
    pub decimals: u8,
    pub label: String,
}

impl BalanceRecord {
    pub fn eth(value: U256) -> Self {
        BalanceRecord {
            value,
            decimals: ETH_DECIMALS,
            label: ETH_LABEL.to_string(),
        }
    }

    pub fn token(value: U256, info: &TokenInfo) -> Self {
        BalanceRecord {
            value,
            decimals: info.decimals,
            label: info.symbol.clone(),
        }
    }

    pub fn liquidity(value: U256) -> Self {
        BalanceRecord {
            value,
            decimals: LIQUIDITY_DECIMALS,
            label: LIQUIDITY_LABEL.to_string(),
        }
    }

    pub fn to_fixed(&self, precision: usize) -> String {
        format_units(self.value, self.decimals, precision)
    }
}

/// What a balance query against an address actually means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    /// The address is a known exchange; balances are pool reserves.
    PoolReserve { exchange: H160, token: H160 },
    /// Any other address; balances are what the holder owns.
    HolderBalance,
}

/// Machine-readable pool report written by the binary.
#[derive(Debug, Serialize, Deserialize)]
pub struct PoolReportJson {
    pub exchange_address: String,
    pub token_address: String,
    pub token_symbol: String,
    pub eth_reserve: String,
    pub token_reserve: String,
    pub total_supply: String,
    pub exchange_rate: String,
    pub pool_size: String,
    pub pool_share: Option<String>,
    pub owned: Option<String>,
    pub balance_hint: String,
    pub block_timestamp: u64,
}
