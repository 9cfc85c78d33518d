use ethers_core::types::{H160, U256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("no reserve snapshot for {what} {address:?}")]
    MissingSnapshot { what: &'static str, address: H160 },

    #[error("division by zero while computing {0}")]
    DivisionByZero(&'static str),

    #[error("Insufficient balance")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },

    #[error("liquidity {held} exceeds total supply {total_supply}")]
    InconsistentSnapshot { held: U256, total_supply: U256 },

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("chain read {method} failed: {reason}")]
    ReadFailure { method: &'static str, reason: String },

    #[error("transaction submission failed: {0}")]
    SubmissionError(String),

    #[error("transaction ledger is no longer running")]
    LedgerClosed,
}

impl CoreError {
    pub fn read(method: &'static str, err: impl std::fmt::Display) -> Self {
        CoreError::ReadFailure {
            method,
            reason: err.to_string(),
        }
    }

    pub fn missing_exchange(token: H160) -> Self {
        CoreError::MissingSnapshot {
            what: "token",
            address: token,
        }
    }

    pub fn invalid_amount(input: &str, reason: &'static str) -> Self {
        CoreError::InvalidAmount {
            input: input.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
