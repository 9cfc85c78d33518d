//! Sizing, previewing and submitting a liquidity removal.

use ethers_core::types::{H160, U256};
use serde::Serialize;
use tracing::info;

use crate::{
    balances::{eth_per_liquidity, supply_share, token_per_liquidity},
    config::Settings,
    error::{CoreError, Result},
    fixed::{format_units, parse_units, trim_trailing_zeros, Fraction},
    ledger::TxId,
    requests::{ChainRead, SubmitTransaction},
    tracker::LedgerHandle,
    types::{BalanceRecord, ReserveSnapshot, ETH_DECIMALS, LIQUIDITY_DECIMALS},
};

/// The arguments of one `removeLiquidity` call, minus the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalPlan {
    pub exchange: H160,
    /// Liquidity tokens burned, raw units.
    pub amount: U256,
    pub ownership: Fraction,
    pub eth_withdrawn: U256,
    pub token_withdrawn: U256,
    pub min_eth: U256,
    pub min_tokens: U256,
    pub slippage_bps: u64,
}

/// Checks the user can burn `input` liquidity tokens. Returns the raw amount.
pub fn validate_removal(input: &str, liquidity_balance: &BalanceRecord) -> Result<U256> {
    let amount = parse_units(input, liquidity_balance.decimals)?;
    if amount.is_zero() {
        return Err(CoreError::invalid_amount(input, "amount cannot be zero"));
    }
    if liquidity_balance.value < amount {
        return Err(CoreError::InsufficientBalance {
            required: amount,
            available: liquidity_balance.value,
        });
    }
    Ok(amount)
}

impl RemovalPlan {
    pub fn build(
        input: &str,
        snapshot: &ReserveSnapshot,
        liquidity_balance: &BalanceRecord,
        slippage_bps: u64,
    ) -> Result<Self> {
        let amount = validate_removal(input, liquidity_balance)?;
        let ownership = supply_share(snapshot, amount, "removal ownership")?;

        // Minimums are truncated in a single step so they never overstate
        // what the pool will pay out.
        Ok(RemovalPlan {
            exchange: snapshot.exchange_address,
            amount,
            ownership,
            eth_withdrawn: ownership.scale(snapshot.eth_reserve)?,
            token_withdrawn: ownership.scale(snapshot.token_reserve)?,
            min_eth: ownership.scale_discounted(snapshot.eth_reserve, slippage_bps)?,
            min_tokens: ownership.scale_discounted(snapshot.token_reserve, slippage_bps)?,
            slippage_bps,
        })
    }
}

/// What the removal form shows before the user confirms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalPreview {
    pub label: String,
    pub eth_output: String,
    pub token_output: String,
    pub eth_withdrawn: String,
    pub min_token_withdrawn: String,
    pub max_token_withdrawn: String,
    pub liquidity_input: String,
    pub remaining_supply: String,
    pub eth_per_liquidity: String,
    pub token_per_liquidity: String,
}

impl RemovalPreview {
    pub fn build(
        input: &str,
        snapshot: &ReserveSnapshot,
        label: &str,
        estimate_slippage_bps: u64,
    ) -> Result<Self> {
        let amount = parse_units(input, LIQUIDITY_DECIMALS)?;
        let share = supply_share(snapshot, amount, "removal estimate")?;

        let eth_withdrawn = share.scale(snapshot.eth_reserve)?;
        let token_withdrawn = share.scale(snapshot.token_reserve)?;
        let min_token = share.scale_discounted(snapshot.token_reserve, estimate_slippage_bps)?;
        let max_token = share.scale_with_premium(snapshot.token_reserve, estimate_slippage_bps)?;
        let remaining = snapshot.total_supply.saturating_sub(amount);

        Ok(RemovalPreview {
            label: label.to_string(),
            eth_output: format_units(eth_withdrawn, ETH_DECIMALS, 3),
            token_output: format_units(token_withdrawn, snapshot.token_decimals, 3),
            eth_withdrawn: trim_trailing_zeros(&format_units(eth_withdrawn, ETH_DECIMALS, 7)),
            min_token_withdrawn: trim_trailing_zeros(&format_units(
                min_token,
                snapshot.token_decimals,
                7,
            )),
            max_token_withdrawn: trim_trailing_zeros(&format_units(
                max_token,
                snapshot.token_decimals,
                7,
            )),
            liquidity_input: trim_trailing_zeros(&format_units(amount, LIQUIDITY_DECIMALS, 18)),
            remaining_supply: trim_trailing_zeros(&format_units(remaining, LIQUIDITY_DECIMALS, 7)),
            eth_per_liquidity: trim_trailing_zeros(&eth_per_liquidity(snapshot)?.to_fixed(7)),
            token_per_liquidity: trim_trailing_zeros(&token_per_liquidity(snapshot)?.to_fixed(7)),
        })
    }

    /// The estimate as a single line under the input.
    pub fn output_line(&self) -> String {
        format!("{} ETH + {} {}", self.eth_output, self.token_output, self.label)
    }

    pub fn detail_lines(&self) -> Vec<String> {
        vec![
            format!(
                "You are removing between {} ETH and {} - {} {} from the liquidity pool.",
                self.eth_withdrawn, self.min_token_withdrawn, self.max_token_withdrawn, self.label
            ),
            format!("You will remove {} liquidity tokens.", self.liquidity_input),
            format!(
                "Current total supply of liquidity tokens is {}",
                self.remaining_supply
            ),
            format!(
                "At current exchange rate, each pool token is worth {} ETH and {} {}",
                self.eth_per_liquidity, self.token_per_liquidity, self.label
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextualInfo {
    pub message: String,
    pub is_error: bool,
}

/// The hint under the removal form. `token_label` is `None` until a token is picked.
pub fn contextual_info(
    token_label: Option<&str>,
    input: &str,
    validation: Option<&CoreError>,
) -> Option<ContextualInfo> {
    if let Some(err) = validation {
        return Some(ContextualInfo {
            message: validation_message(err),
            is_error: true,
        });
    }
    let hint = |message: String| {
        Some(ContextualInfo {
            message,
            is_error: false,
        })
    };
    match token_label {
        None => hint("Select a token to continue.".to_string()),
        Some(_) if is_zero_input(input) => hint("Amount cannot be zero.".to_string()),
        Some(label) if input.trim().is_empty() => hint(format!("Enter a {label} value to continue.")),
        Some(_) => None,
    }
}

fn is_zero_input(input: &str) -> bool {
    matches!(parse_units(input, LIQUIDITY_DECIMALS), Ok(amount) if amount.is_zero())
}

fn validation_message(err: &CoreError) -> String {
    match err {
        CoreError::InsufficientBalance { .. } => "Insufficient balance".to_string(),
        other => other.to_string(),
    }
}

/// Latest block timestamp plus `offset_secs`, taken from the chain's clock.
pub async fn deadline<R: ChainRead>(reader: &R, offset_secs: u64) -> Result<u64> {
    let timestamp = reader.latest_block_timestamp().await?;
    timestamp
        .checked_add(offset_secs)
        .ok_or(CoreError::Overflow("deadline"))
}

/// Sends the removal and records it as pending. A failed send leaves the
/// ledger untouched.
pub async fn submit_removal<C>(
    client: &C,
    ledger: &LedgerHandle,
    account: H160,
    plan: &RemovalPlan,
    settings: &Settings,
) -> Result<TxId>
where
    C: ChainRead + SubmitTransaction,
{
    let deadline = deadline(client, settings.deadline_offset_secs).await?;
    let id = client.remove_liquidity(account, plan, deadline).await?;
    ledger.add_pending(id.clone()).await?;
    info!(
        tx = %id,
        exchange = ?plan.exchange,
        amount = %plan.amount,
        min_eth = %plan.min_eth,
        min_tokens = %plan.min_tokens,
        deadline,
        "submitted liquidity removal"
    );
    Ok(id)
}
