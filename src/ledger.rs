use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

use ethers_core::types::H256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const EXPLORER_TX_URL: &str = "https://etherscan.io/tx/";

/// Network-assigned transaction identifier, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as a transaction hash, if it is one.
    pub fn as_hash(&self) -> Option<H256> {
        H256::from_str(&self.0).ok()
    }

    pub fn explorer_link(&self) -> String {
        format!("{}{}", EXPLORER_TX_URL, self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(id: &str) -> Self {
        TxId(id.to_string())
    }
}

impl From<String> for TxId {
    fn from(id: String) -> Self {
        TxId(id)
    }
}

impl From<H256> for TxId {
    fn from(hash: H256) -> Self {
        TxId(format!("{hash:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Mined with a failing status.
    Reverted,
    /// Reported gone from the network by an external signal.
    Dropped,
    /// Pending longer than the expiry policy allows.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed(FailureReason),
}

#[derive(Debug, Clone)]
pub struct TxEntry {
    pub id: TxId,
    pub status: TxStatus,
    pub submitted_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub max_pending_age: Option<Duration>,
}

impl ExpiryPolicy {
    pub fn never() -> Self {
        ExpiryPolicy::default()
    }

    pub fn after(age: Duration) -> Self {
        ExpiryPolicy {
            max_pending_age: Some(age),
        }
    }
}

/// A consistent copy of the ledger for readers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub pending: Vec<TxId>,
    pub confirmed: Vec<TxId>,
    pub failed: Vec<(TxId, FailureReason)>,
}

impl LedgerSnapshot {
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TransactionLedger {
    entries: Vec<TxEntry>,
    index: HashMap<TxId, usize>,
    confirmed_order: Vec<usize>,
    failed_order: Vec<usize>,
    expiry: ExpiryPolicy,
}

impl TransactionLedger {
    pub fn new(expiry: ExpiryPolicy) -> Self {
        TransactionLedger {
            expiry,
            ..Default::default()
        }
    }

    /// Returns `false` if the identifier was already known.
    pub fn add_pending(&mut self, id: impl Into<TxId>) -> bool {
        self.add_pending_at(id, Instant::now())
    }

    pub fn add_pending_at(&mut self, id: impl Into<TxId>, submitted_at: Instant) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            debug!(tx = %id, "transaction already tracked");
            return false;
        }
        info!(tx = %id, "transaction pending");
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(TxEntry {
            id,
            status: TxStatus::Pending,
            submitted_at,
        });
        true
    }

    /// Returns `false` if the identifier was not pending.
    pub fn confirm(&mut self, id: &TxId) -> bool {
        self.reclassify(id, TxStatus::Confirmed)
    }

    pub fn fail(&mut self, id: &TxId, reason: FailureReason) -> bool {
        self.reclassify(id, TxStatus::Failed(reason))
    }

    fn reclassify(&mut self, id: &TxId, status: TxStatus) -> bool {
        let Some(&position) = self.index.get(id) else {
            debug!(tx = %id, ?status, "ignoring event for unknown transaction");
            return false;
        };
        let entry = &mut self.entries[position];
        if entry.status != TxStatus::Pending {
            debug!(tx = %id, ?status, current = ?entry.status, "ignoring event for settled transaction");
            return false;
        }
        entry.status = status;
        match status {
            TxStatus::Confirmed => {
                info!(tx = %id, "transaction confirmed");
                self.confirmed_order.push(position);
            }
            TxStatus::Failed(reason) => {
                warn!(tx = %id, ?reason, "transaction failed");
                self.failed_order.push(position);
            }
            TxStatus::Pending => {}
        }
        true
    }

    pub fn status(&self, id: &TxId) -> Option<TxStatus> {
        self.index.get(id).map(|&position| self.entries[position].status)
    }

    /// Pending identifiers in submission order.
    pub fn pending_list(&self) -> Vec<TxId> {
        self.entries
            .iter()
            .filter(|entry| entry.status == TxStatus::Pending)
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Confirmed identifiers in the order they were confirmed.
    pub fn confirmed_list(&self) -> Vec<TxId> {
        self.confirmed_order
            .iter()
            .map(|&position| self.entries[position].id.clone())
            .collect()
    }

    pub fn failed_list(&self) -> Vec<(TxId, FailureReason)> {
        self.failed_order
            .iter()
            .filter_map(|&position| {
                let entry = &self.entries[position];
                match entry.status {
                    TxStatus::Failed(reason) => Some((entry.id.clone(), reason)),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.status == TxStatus::Pending)
    }

    /// Every transaction ever tracked, in submission order.
    pub fn history(&self) -> &[TxEntry] {
        &self.entries
    }

    /// Pending identifiers older than the expiry threshold at `now`.
    pub fn stale(&self, now: Instant) -> Vec<TxId> {
        let Some(max_age) = self.expiry.max_pending_age else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|entry| {
                entry.status == TxStatus::Pending
                    && now.saturating_duration_since(entry.submitted_at) > max_age
            })
            .map(|entry| entry.id.clone())
            .collect()
    }

    pub fn expire_stale(&mut self, now: Instant) -> Vec<TxId> {
        let stale = self.stale(now);
        for id in &stale {
            self.fail(id, FailureReason::Expired);
        }
        stale
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            pending: self.pending_list(),
            confirmed: self.confirmed_list(),
            failed: self.failed_list(),
        }
    }
}
