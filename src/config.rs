use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables shared by the removal flow, the ledger and the status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Network the UI considers "connected".
    pub network_id: u64,
    /// Guard applied to the minimums sent on-chain.
    pub submit_slippage_bps: u64,
    /// Range shown in the removal estimate.
    pub estimate_slippage_bps: u64,
    /// Added to the latest block timestamp.
    pub deadline_offset_secs: u64,
    pub receipt_poll_interval_ms: u64,
    /// Pending transactions older than this are expired. `None` keeps them forever.
    pub pending_expiry_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            network_id: 1,
            submit_slippage_bps: 200,
            estimate_slippage_bps: 250,
            deadline_offset_secs: 300,
            receipt_poll_interval_ms: 4_000,
            pending_expiry_secs: None,
        }
    }
}

impl Settings {
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn pending_expiry(&self) -> Option<Duration> {
        self.pending_expiry_secs.map(Duration::from_secs)
    }
}
