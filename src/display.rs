use ethers_core::types::{H160, U256};
use serde::Serialize;
use tracing::debug;

use crate::{
    balances::{exchange_rate, ownership_share, BalanceBook},
    error::{CoreError, Result},
    fixed::format_units,
    ledger::LedgerSnapshot,
    types::{ReserveSnapshot, ETH_DECIMALS},
    utils::display_address,
};

pub const PLACEHOLDER: &str = "-";

/// "N Pending" while anything is pending, otherwise the account.
pub fn status_text(account: Option<&str>, transactions: &LedgerSnapshot) -> String {
    if transactions.has_pending() {
        format!("{} Pending", transactions.pending.len())
    } else {
        display_address(account)
    }
}

pub fn is_connected(account: Option<&str>, network_id: Option<u64>, expected_network_id: u64) -> bool {
    account.is_some_and(|account| !account.is_empty()) && network_id == Some(expected_network_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub label: String,
    pub exchange_rate: String,
    pub pool_size: String,
    /// `None` when there is no account or no supply to take a share of.
    pub share_percent: Option<String>,
    pub owned: Option<String>,
    pub balance_hint: String,
}

impl PoolSummary {
    pub fn placeholder() -> Self {
        PoolSummary {
            label: String::new(),
            exchange_rate: PLACEHOLDER.to_string(),
            pool_size: PLACEHOLDER.to_string(),
            share_percent: None,
            owned: None,
            balance_hint: String::new(),
        }
    }

    /// Summary of the pool trading `token`, from `account`'s point of view.
    pub fn build(book: &BalanceBook, account: Option<H160>, token: H160) -> Self {
        match Self::try_build(book, account, token) {
            Ok(summary) => summary,
            Err(err) => {
                debug!("pool summary unavailable: {}", err);
                Self::placeholder()
            }
        }
    }

    fn try_build(book: &BalanceBook, account: Option<H160>, token: H160) -> Result<Self> {
        let snapshot = book.snapshot_for_token(token)?;
        let label = book
            .token_info(token)
            .map(|info| info.symbol.clone())
            .unwrap_or_default();

        let exchange_rate = match exchange_rate(snapshot) {
            Ok(rate) => format!("1 ETH = {} {}", rate.to_fixed(4), label),
            Err(CoreError::DivisionByZero(_)) => PLACEHOLDER.to_string(),
            Err(err) => return Err(err),
        };
        let pool_size = format!(
            "{} ETH + {} {}",
            format_units(snapshot.eth_reserve, ETH_DECIMALS, 2),
            format_units(snapshot.token_reserve, snapshot.token_decimals, 2),
            label
        );

        let mut summary = PoolSummary {
            label,
            exchange_rate,
            pool_size,
            share_percent: None,
            owned: None,
            balance_hint: String::new(),
        };

        if let Some(account) = account {
            if let Ok(liquidity) = book.get_balance(account, Some(snapshot.exchange_address)) {
                summary.balance_hint = format!("Balance: {}", liquidity.to_fixed(7));
                summary.fill_share(snapshot, liquidity.value)?;
            }
        }
        Ok(summary)
    }

    fn fill_share(&mut self, snapshot: &ReserveSnapshot, liquidity: U256) -> Result<()> {
        match ownership_share(snapshot, liquidity) {
            Ok(share) => {
                self.share_percent = Some(share.ownership.percent(2));
                self.owned = Some(format!(
                    "{} ETH + {} {}",
                    format_units(share.owned_eth, ETH_DECIMALS, 2),
                    format_units(share.owned_token, share.token_decimals, 2),
                    self.label
                ));
                Ok(())
            }
            Err(CoreError::DivisionByZero(_)) => Ok(()),
            Err(err @ CoreError::InconsistentSnapshot { .. }) => {
                debug!("pool share hidden: {}", err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub fn share_line(&self) -> String {
        match (&self.share_percent, &self.owned) {
            (Some(percent), Some(owned)) => format!("Your Pool Share ({percent}%) {owned}"),
            _ => format!("Your Pool Share {PLACEHOLDER}"),
        }
    }
}
