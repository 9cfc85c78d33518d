#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use ethers_core::types::{H160, H256, U256};
use uniswap_pool_ledger::{
    ledger::TxId,
    removal::RemovalPlan,
    requests::{ChainRead, SubmitTransaction},
    types::TokenInfo,
    CoreError, Result,
};

pub const EXCHANGE: H160 = H160([0xee; 20]);
pub const TOKEN: H160 = H160([0x70; 20]);
pub const USER: H160 = H160([0x01; 20]);

pub fn units(n: u64, decimals: u32) -> U256 {
    U256::from(n) * U256::exp10(decimals as usize)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRemoval {
    pub from: H160,
    pub exchange: H160,
    pub amount: U256,
    pub min_eth: U256,
    pub min_tokens: U256,
    pub deadline: u64,
}

#[derive(Debug, Default)]
pub struct ChainState {
    pub exchange_tokens: HashMap<H160, H160>,
    pub total_supply: HashMap<H160, U256>,
    pub eth: HashMap<H160, U256>,
    pub erc20: HashMap<(H160, H160), U256>,
    pub tokens: HashMap<H160, TokenInfo>,
    pub block_timestamp: u64,
    pub receipts: HashMap<H256, bool>,
    pub sent: Vec<SentRemoval>,
    pub reject_sends: bool,
    pub token_info_reads: usize,
}

/// In-memory chain with the scenario pool: 10 ETH / 5000 USDC (6 decimals),
/// 100 liquidity tokens, of which the user holds 10.
#[derive(Debug, Clone, Default)]
pub struct FakeChain {
    pub state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn scenario() -> Self {
        let chain = FakeChain::default();
        {
            let mut state = chain.state.lock().unwrap();
            state.exchange_tokens.insert(EXCHANGE, TOKEN);
            state.total_supply.insert(EXCHANGE, units(100, 18));
            state.eth.insert(EXCHANGE, units(10, 18));
            state.eth.insert(USER, units(2, 18));
            state.erc20.insert((TOKEN, EXCHANGE), units(5000, 6));
            state.erc20.insert((EXCHANGE, USER), units(10, 18));
            state.erc20.insert((TOKEN, USER), units(25, 6));
            state.tokens.insert(
                TOKEN,
                TokenInfo {
                    address: TOKEN,
                    symbol: "USDC".into(),
                    decimals: 6,
                },
            );
            state.block_timestamp = 1_700_000_000;
        }
        chain
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

fn missing(method: &'static str) -> CoreError {
    CoreError::read(method, "execution reverted")
}

impl ChainRead for FakeChain {
    async fn exchange_token(&self, exchange: H160) -> Result<H160> {
        self.with(|s| s.exchange_tokens.get(&exchange).copied())
            .ok_or_else(|| missing("tokenAddress"))
    }

    async fn total_supply(&self, exchange: H160) -> Result<U256> {
        self.with(|s| s.total_supply.get(&exchange).copied())
            .ok_or_else(|| missing("totalSupply"))
    }

    async fn eth_balance(&self, owner: H160) -> Result<U256> {
        Ok(self.with(|s| s.eth.get(&owner).copied().unwrap_or_default()))
    }

    async fn token_balance(&self, token: H160, owner: H160) -> Result<U256> {
        Ok(self.with(|s| s.erc20.get(&(token, owner)).copied().unwrap_or_default()))
    }

    async fn token_info(&self, token: H160) -> Result<TokenInfo> {
        self.with(|s| {
            s.token_info_reads += 1;
            s.tokens.get(&token).cloned()
        })
        .ok_or_else(|| missing("decimals"))
    }

    async fn latest_block_timestamp(&self) -> Result<u64> {
        Ok(self.with(|s| s.block_timestamp))
    }

    async fn receipt_status(&self, hash: H256) -> Result<Option<bool>> {
        Ok(self.with(|s| s.receipts.get(&hash).copied()))
    }
}

impl SubmitTransaction for FakeChain {
    async fn remove_liquidity(&self, from: H160, plan: &RemovalPlan, deadline: u64) -> Result<TxId> {
        self.with(|s| {
            if s.reject_sends {
                return Err(CoreError::SubmissionError("user denied transaction".into()));
            }
            s.sent.push(SentRemoval {
                from,
                exchange: plan.exchange,
                amount: plan.amount,
                min_eth: plan.min_eth,
                min_tokens: plan.min_tokens,
                deadline,
            });
            let hash = H256::from_low_u64_be(s.sent.len() as u64);
            Ok(TxId::from(hash))
        })
    }
}
