mod common;

use std::time::Duration;

use common::FakeChain;
use ethers_core::types::H256;
use uniswap_pool_ledger::{
    display::status_text,
    ledger::{ExpiryPolicy, FailureReason, TxId, TxStatus},
    tracker::{spawn_ledger, ConfirmationWatcher, LedgerCommand},
    CoreError,
};

fn id(s: &str) -> TxId {
    TxId::from(s)
}

#[tokio::test]
async fn scenario_d_through_the_handle() {
    let (ledger, task) = spawn_ledger(ExpiryPolicy::never());

    assert!(ledger.add_pending("tx1").await.unwrap());
    assert_eq!(ledger.snapshot().pending, vec![id("tx1")]);

    assert!(ledger.confirm("tx1").await.unwrap());
    let snapshot = ledger.snapshot();
    assert!(snapshot.pending.is_empty());
    assert_eq!(snapshot.confirmed, vec![id("tx1")]);

    drop(ledger);
    let ledger = task.await.unwrap();
    assert_eq!(ledger.status(&id("tx1")), Some(TxStatus::Confirmed));
}

#[tokio::test]
async fn duplicate_and_stray_events_report_no_change() {
    let (ledger, _task) = spawn_ledger(ExpiryPolicy::never());
    assert!(ledger.add_pending("tx1").await.unwrap());
    assert!(!ledger.add_pending("tx1").await.unwrap());
    assert!(!ledger.confirm("nope").await.unwrap());
    assert!(ledger.fail("tx1", FailureReason::Dropped).await.unwrap());
    assert!(!ledger.confirm("tx1").await.unwrap());

    let snapshot = ledger.snapshot();
    assert!(snapshot.confirmed.is_empty());
    assert_eq!(snapshot.failed, vec![(id("tx1"), FailureReason::Dropped)]);
}

#[tokio::test]
async fn concurrent_writers_never_lose_a_transaction() {
    let (ledger, _task) = spawn_ledger(ExpiryPolicy::never());
    let mut updates = ledger.subscribe();

    let writers: Vec<_> = (0..16)
        .map(|n| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let tx = format!("tx{n}");
                ledger.add_pending(tx.as_str()).await.unwrap();
                if n % 2 == 0 {
                    ledger.confirm(tx.as_str()).await.unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }

    updates.mark_changed();
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.pending.len() + snapshot.confirmed.len(), 16);
    assert_eq!(snapshot.confirmed.len(), 8);
    for tx in &snapshot.pending {
        assert!(!snapshot.confirmed.contains(tx));
    }
}

#[tokio::test]
async fn closed_ledger_is_an_error() {
    let (ledger, task) = spawn_ledger(ExpiryPolicy::never());
    task.abort();
    let _ = task.await;
    assert_eq!(ledger.add_pending("tx1").await, Err(CoreError::LedgerClosed));
}

#[tokio::test]
async fn watcher_applies_receipts() {
    let chain = FakeChain::default();
    let (ledger, _task) = spawn_ledger(ExpiryPolicy::never());

    let ok = H256::from_low_u64_be(1);
    let reverted = H256::from_low_u64_be(2);
    let unmined = H256::from_low_u64_be(3);
    for hash in [ok, reverted, unmined] {
        ledger.add_pending(hash).await.unwrap();
    }
    ledger.add_pending("not-a-hash").await.unwrap();

    chain.with(|s| {
        s.receipts.insert(ok, true);
        s.receipts.insert(reverted, false);
    });

    let watcher = ConfirmationWatcher::new(chain.clone(), ledger.clone(), Duration::from_millis(10));
    assert_eq!(watcher.poll_once().await.unwrap(), 2);

    let snapshot = ledger.snapshot();
    assert_eq!(snapshot.confirmed, vec![TxId::from(ok)]);
    assert_eq!(snapshot.failed, vec![(TxId::from(reverted), FailureReason::Reverted)]);
    assert_eq!(snapshot.pending, vec![TxId::from(unmined), id("not-a-hash")]);
    assert_eq!(status_text(None, &snapshot), "2 Pending");

    // A second poll with no new receipts changes nothing.
    assert_eq!(watcher.poll_once().await.unwrap(), 0);
}

#[tokio::test]
async fn watcher_runs_until_settled() {
    let chain = FakeChain::default();
    let (ledger, _task) = spawn_ledger(ExpiryPolicy::never());
    let hash = H256::from_low_u64_be(7);
    ledger.add_pending(hash).await.unwrap();
    chain.with(|s| s.receipts.insert(hash, true));

    let watcher = ConfirmationWatcher::new(chain, ledger.clone(), Duration::from_millis(5));
    tokio::time::timeout(Duration::from_secs(5), watcher.run_until_settled())
        .await
        .expect("watcher did not settle")
        .unwrap();
    assert!(!ledger.snapshot().has_pending());
}

#[tokio::test]
async fn expiry_policy_fails_stale_transactions() {
    let (ledger, _task) = spawn_ledger(ExpiryPolicy::after(Duration::ZERO));
    ledger.add_pending("slow").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(ledger.dispatch(LedgerCommand::ExpireStale).await.unwrap());
    assert_eq!(
        ledger.snapshot().failed,
        vec![(id("slow"), FailureReason::Expired)]
    );
}
