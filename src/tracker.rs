use std::time::{Duration, Instant};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    error::{CoreError, Result},
    ledger::{ExpiryPolicy, FailureReason, LedgerSnapshot, TransactionLedger, TxId},
    requests::ChainRead,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    AddPending(TxId),
    Confirm(TxId),
    Fail(TxId, FailureReason),
    ExpireStale,
}

struct Envelope {
    command: LedgerCommand,
    applied: oneshot::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct LedgerHandle {
    commands: mpsc::UnboundedSender<Envelope>,
    snapshots: watch::Receiver<LedgerSnapshot>,
}

/// Starts the ledger task. It runs until every handle is dropped and then
/// hands the ledger back through the join handle.
pub fn spawn_ledger(expiry: ExpiryPolicy) -> (LedgerHandle, JoinHandle<TransactionLedger>) {
    let ledger = TransactionLedger::new(expiry);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (snapshots_tx, snapshots_rx) = watch::channel(ledger.snapshot());

    let task = tokio::spawn(run_ledger(ledger, commands_rx, snapshots_tx));
    let handle = LedgerHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
    };
    (handle, task)
}

async fn run_ledger(
    mut ledger: TransactionLedger,
    mut commands: mpsc::UnboundedReceiver<Envelope>,
    snapshots: watch::Sender<LedgerSnapshot>,
) -> TransactionLedger {
    while let Some(Envelope { command, applied }) = commands.recv().await {
        let changed = apply(&mut ledger, command);
        if changed {
            snapshots.send_replace(ledger.snapshot());
        }
        // The caller may have stopped waiting; the change stands either way.
        let _ = applied.send(changed);
    }
    debug!("ledger task stopped");
    ledger
}

fn apply(ledger: &mut TransactionLedger, command: LedgerCommand) -> bool {
    match command {
        LedgerCommand::AddPending(id) => ledger.add_pending(id),
        LedgerCommand::Confirm(id) => ledger.confirm(&id),
        LedgerCommand::Fail(id, reason) => ledger.fail(&id, reason),
        LedgerCommand::ExpireStale => !ledger.expire_stale(Instant::now()).is_empty(),
    }
}

impl LedgerHandle {
    /// Sends a command and waits until it has been applied.
    /// Returns whether the ledger changed.
    pub async fn dispatch(&self, command: LedgerCommand) -> Result<bool> {
        let (applied, outcome) = oneshot::channel();
        self.commands
            .send(Envelope { command, applied })
            .map_err(|_| CoreError::LedgerClosed)?;
        outcome.await.map_err(|_| CoreError::LedgerClosed)
    }

    pub async fn add_pending(&self, id: impl Into<TxId>) -> Result<bool> {
        self.dispatch(LedgerCommand::AddPending(id.into())).await
    }

    pub async fn confirm(&self, id: impl Into<TxId>) -> Result<bool> {
        self.dispatch(LedgerCommand::Confirm(id.into())).await
    }

    pub async fn fail(&self, id: impl Into<TxId>, reason: FailureReason) -> Result<bool> {
        self.dispatch(LedgerCommand::Fail(id.into(), reason)).await
    }

    pub async fn expire_stale(&self) -> Result<bool> {
        self.dispatch(LedgerCommand::ExpireStale).await
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.snapshots.clone()
    }
}

/// Turns receipts into ledger events for every pending transaction.
pub struct ConfirmationWatcher<R> {
    reader: R,
    ledger: LedgerHandle,
    interval: Duration,
}

impl<R: ChainRead> ConfirmationWatcher<R> {
    pub fn new(reader: R, ledger: LedgerHandle, interval: Duration) -> Self {
        ConfirmationWatcher {
            reader,
            ledger,
            interval,
        }
    }

    /// Checks each pending transaction once. Returns how many were settled.
    pub async fn poll_once(&self) -> Result<usize> {
        let mut settled = 0;
        for id in self.ledger.snapshot().pending {
            let Some(hash) = id.as_hash() else {
                debug!(tx = %id, "pending identifier is not a hash, skipping receipt lookup");
                continue;
            };
            let changed = match self.reader.receipt_status(hash).await? {
                Some(true) => self.ledger.confirm(id).await?,
                Some(false) => self.ledger.fail(id, FailureReason::Reverted).await?,
                None => false,
            };
            if changed {
                settled += 1;
            }
        }

        if self.ledger.expire_stale().await? {
            info!("expired stale pending transactions");
        }
        Ok(settled)
    }

    /// Polls on the configured interval until nothing is pending.
    pub async fn run_until_settled(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let settled = self.poll_once().await?;
            if settled > 0 {
                debug!(settled, "receipts observed");
            }
            if !self.ledger.snapshot().has_pending() {
                return Ok(());
            }
        }
    }
}
