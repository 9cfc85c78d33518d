pub mod abi;
pub mod balances;
pub mod config;
pub mod display;
pub mod error;
pub mod fixed;
pub mod ledger;
pub mod removal;
pub mod requests;
pub mod tracker;
pub mod types;
pub mod utils;

pub use error::{CoreError, Result};
