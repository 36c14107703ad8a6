//! Replica protocol tests against an in-memory remote shared by several
//! replicas.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use safeman_core::{Item, ItemDraft, Snapshot, TransactionType};
use safeman_db::{Database, DbConfig, LedgerStore};
use safeman_sync::{
    IssuanceRequest, RemoteSnapshotClient, ReservationTracker, SafemanConfig, SyncError, SyncResult,
    SyncStatus, Synchronizer, TransactionProcessor,
};

const ENDPOINT: &str = "http://remote.test/exec";

// =============================================================================
// Fake Remote
// =============================================================================

#[derive(Default)]
struct FakeRemote {
    document: Mutex<Snapshot>,
    fail_pull: AtomicBool,
    fail_push: AtomicBool,
    hold_pulls: AtomicBool,
    release: Notify,
    pulls: AtomicUsize,
    pushes: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
}

impl FakeRemote {
    fn with_items(items: Vec<Item>) -> Arc<Self> {
        let remote = FakeRemote::default();
        remote.document.lock().unwrap().items = items;
        Arc::new(remote)
    }

    fn document(&self) -> Snapshot {
        self.document.lock().unwrap().clone()
    }

    fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSnapshotClient for FakeRemote {
    async fn pull(&self, endpoint: &str) -> SyncResult<Snapshot> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().unwrap().push(endpoint.to_string());

        if self.hold_pulls.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(SyncError::RequestFailed("remote unreachable".into()));
        }
        Ok(self.document())
    }

    async fn push(&self, _endpoint: &str, snapshot: &Snapshot) -> SyncResult<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(SyncError::RequestFailed("remote unreachable".into()));
        }
        *self.document.lock().unwrap() = snapshot.clone();
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn stocked(name: &str, quantity: i64) -> Item {
    let mut item = Item::from_draft(ItemDraft::new(name, "pc"), 0);
    item.quantity = quantity;
    item
}

async fn store() -> Arc<LedgerStore> {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Arc::new(LedgerStore::new(db))
}

fn config(url: Option<&str>) -> SafemanConfig {
    let mut config = SafemanConfig::default();
    config.remote.url = url.map(String::from);
    config
}

async fn replica(remote: &Arc<FakeRemote>, url: Option<&str>) -> Arc<TransactionProcessor> {
    let sync = Arc::new(Synchronizer::new(store().await, remote.clone(), config(url)));
    sync.initialize().await;
    Arc::new(TransactionProcessor::new(sync))
}

fn tracker(processor: &TransactionProcessor, mode: TransactionType) -> ReservationTracker {
    ReservationTracker::new(processor.synchronizer().store().clone(), mode)
}

fn issue(dept: &str) -> IssuanceRequest {
    IssuanceRequest::new(dept, "Chen", "")
}

async fn wait_until_committing(processor: &TransactionProcessor) {
    for _ in 0..1000 {
        if processor.synchronizer().is_committing() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("commit never started");
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_stale_replica_commits_against_refreshed_quantity() {
    let x = stocked("X", 10);
    let id = x.id.clone();
    let remote = FakeRemote::with_items(vec![x]);

    let first = replica(&remote, Some(ENDPOINT)).await;
    let second = replica(&remote, Some(ENDPOINT)).await;

    // second replica issues 3 and pushes 7
    let basket = tracker(&second, TransactionType::Out);
    basket.reserve(&id, 3).await.unwrap();
    second.commit(&basket, issue("南一隊")).await.unwrap();
    assert_eq!(remote.document().items[0].quantity, 7);

    // first replica still believes 10 locally
    assert_eq!(first.synchronizer().store().items().await[0].quantity, 10);
    let basket = tracker(&first, TransactionType::Out);
    basket.reserve(&id, 4).await.unwrap();
    first.commit(&basket, issue("南二隊")).await.unwrap();

    let document = remote.document();
    assert_eq!(document.items[0].quantity, 3);
    assert_eq!(document.logs.len(), 2);
    assert_eq!(document.logs[0].dept, "南二隊");
    assert_eq!(document.logs[1].dept, "南一隊");
    assert_eq!(first.synchronizer().state().await.status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_concurrent_commit_is_rejected_without_side_effects() {
    let x = stocked("X", 10);
    let id = x.id.clone();
    let remote = FakeRemote::with_items(vec![x]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    let first_basket = Arc::new(tracker(&processor, TransactionType::Out));
    first_basket.reserve(&id, 2).await.unwrap();
    let second_basket = tracker(&processor, TransactionType::Out);
    second_basket.reserve(&id, 5).await.unwrap();

    remote.hold_pulls.store(true, Ordering::SeqCst);
    let in_flight = tokio::spawn({
        let processor = processor.clone();
        let basket = first_basket.clone();
        async move { processor.commit(&basket, issue("南一隊")).await }
    });
    wait_until_committing(&processor).await;

    let err = processor.commit(&second_basket, issue("南三隊")).await.unwrap_err();
    assert!(matches!(err, SyncError::CommitInProgress));
    assert_eq!(second_basket.entries().len(), 1);

    // the background poll also stays out of the way
    assert!(!processor.synchronizer().periodic_tick().await);

    remote.hold_pulls.store(false, Ordering::SeqCst);
    remote.release.notify_one();
    let batch = in_flight.await.unwrap().unwrap();
    assert_eq!(batch.entries.len(), 1);

    let document = remote.document();
    assert_eq!(document.items[0].quantity, 8);
    assert_eq!(document.logs.len(), 1);
}

#[tokio::test]
async fn test_back_to_back_commits_prepend_in_order() {
    let x = stocked("X", 10);
    let id = x.id.clone();
    let remote = FakeRemote::with_items(vec![x]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    let basket = tracker(&processor, TransactionType::Out);
    basket.reserve(&id, 1).await.unwrap();
    let first = processor.commit(&basket, issue("南一隊")).await.unwrap();

    basket.reserve(&id, 2).await.unwrap();
    let second = processor.commit(&basket, issue("南四隊")).await.unwrap();

    let document = remote.document();
    assert_eq!(document.items[0].quantity, 7);
    assert_eq!(document.logs[0].id, second.transactions[0].id);
    assert_eq!(document.logs[1].id, first.transactions[0].id);
}

#[tokio::test]
async fn test_pushing_a_pulled_snapshot_changes_nothing() {
    let remote = FakeRemote::with_items(vec![stocked("X", 4), stocked("Y", 0)]);
    let processor = replica(&remote, Some(ENDPOINT)).await;
    let sync = processor.synchronizer();

    let before = remote.document();
    let pulled = sync.pull().await.unwrap().unwrap();
    sync.push(&pulled).await.unwrap();

    assert!(remote.document().same_content(&before));
}

#[tokio::test]
async fn test_refresh_failure_applies_to_local_basis() {
    let x = stocked("X", 10);
    let id = x.id.clone();
    let remote = FakeRemote::with_items(vec![x]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    let basket = tracker(&processor, TransactionType::Out);
    basket.reserve(&id, 3).await.unwrap();

    remote.fail_pull.store(true, Ordering::SeqCst);
    remote.fail_push.store(true, Ordering::SeqCst);
    processor.commit(&basket, issue("品質組")).await.unwrap();

    let state = processor.synchronizer().state().await;
    assert_eq!(state.status, SyncStatus::Error);
    assert!(state.last_error.is_some());
    assert_eq!(processor.synchronizer().store().items().await[0].quantity, 7);
    assert!(basket.is_empty());

    // a later successful push carries the local change
    remote.fail_push.store(false, Ordering::SeqCst);
    let local = processor.synchronizer().store().snapshot().await;
    processor.synchronizer().push(&local).await.unwrap();
    assert_eq!(remote.document().items[0].quantity, 7);
    assert_eq!(processor.synchronizer().state().await.status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_vanished_item_is_logged_but_not_recreated() {
    let x = stocked("X", 5);
    let y = stocked("Y", 5);
    let (x_id, y_id) = (x.id.clone(), y.id.clone());
    let remote = FakeRemote::with_items(vec![x, y.clone()]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    let basket = tracker(&processor, TransactionType::Out);
    basket.reserve(&x_id, 2).await.unwrap();
    basket.reserve(&y_id, 1).await.unwrap();

    // another replica deleted X in the meantime
    remote.document.lock().unwrap().items = vec![y];

    let batch = processor.commit(&basket, issue("供應組")).await.unwrap();
    assert_eq!(batch.missing_items, vec![x_id.clone()]);
    assert_eq!(batch.transactions.len(), 2);
    assert_eq!(batch.transactions[0].item_name, "X");

    let document = remote.document();
    assert_eq!(document.items.len(), 1);
    assert_eq!(document.items[0].quantity, 4);
    assert!(document.items.iter().all(|i| i.id != x_id));
}

#[tokio::test]
async fn test_endpoint_transitions() {
    let remote = FakeRemote::with_items(vec![stocked("Remote item", 1)]);
    let processor = replica(&remote, None).await;
    let sync = processor.synchronizer();

    assert_eq!(sync.state().await.status, SyncStatus::Local);
    assert_eq!(remote.pulls(), 0);

    let pulled = sync.set_endpoint(&format!("  {}  ", ENDPOINT)).await.unwrap();
    assert_eq!(pulled.unwrap().items.len(), 1);
    let state = sync.state().await;
    assert_eq!(state.status, SyncStatus::Synced);
    assert_eq!(state.endpoint.as_deref(), Some(ENDPOINT));
    assert!(state.last_sync_time.is_some());
    assert_eq!(sync.store().remote_url().await.as_deref(), Some(ENDPOINT));

    sync.set_endpoint("").await.unwrap();
    assert_eq!(sync.state().await.status, SyncStatus::Local);
    assert_eq!(sync.pull().await.unwrap(), None);
    assert_eq!(sync.store().remote_url().await, None);
}

#[tokio::test]
async fn test_configured_url_wins_over_stored_url() {
    let remote = FakeRemote::with_items(vec![]);
    let store = store().await;
    store.set_remote_url(Some("http://stored.test/exec")).await.unwrap();

    let sync = Synchronizer::new(store, remote.clone(), config(Some(ENDPOINT)));
    sync.initialize().await;

    assert_eq!(sync.endpoint().await.as_deref(), Some(ENDPOINT));
    assert_eq!(remote.endpoints.lock().unwrap().as_slice(), &[ENDPOINT.to_string()]);
}

#[tokio::test]
async fn test_stored_url_is_used_without_configuration() {
    let remote = FakeRemote::with_items(vec![stocked("X", 2)]);
    let store = store().await;
    store.set_remote_url(Some(ENDPOINT)).await.unwrap();

    let sync = Synchronizer::new(store, remote.clone(), config(None));
    let snapshot = sync.initialize().await;

    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(sync.state().await.status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_import_replaces_and_pushes_without_refresh() {
    let remote = FakeRemote::with_items(vec![stocked("Old", 1)]);
    let processor = replica(&remote, Some(ENDPOINT)).await;
    let pulls_before = remote.pulls();

    let mut backup = Snapshot::empty();
    backup.items.push(stocked("Restored", 9));
    backup.timestamp = 5;
    processor.import_snapshot(backup).await.unwrap();

    assert_eq!(remote.pulls(), pulls_before);
    let document = remote.document();
    assert_eq!(document.items[0].name, "Restored");
    assert!(document.timestamp > 5);
}

#[tokio::test]
async fn test_editing_a_missing_item_does_not_push() {
    let remote = FakeRemote::with_items(vec![stocked("X", 1)]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    let err = processor
        .edit_item("does-not-exist", ItemDraft::new("Ghost", "pc"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Core(_)));
    assert_eq!(remote.pushes(), 0);
}

#[tokio::test]
async fn test_restock_past_i64_max_is_rejected_before_commit() {
    let x = stocked("X", 5);
    let id = x.id.clone();
    let remote = FakeRemote::with_items(vec![x]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    let basket = tracker(&processor, TransactionType::In);
    let err = basket.reserve(&id, i64::MAX).await.unwrap_err();
    assert!(matches!(err, SyncError::Core(_)));
    assert!(basket.is_empty());

    let err = processor
        .commit(&basket, IssuanceRequest::restock("Chen", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::EmptyBasket));
    assert_eq!(remote.pushes(), 0);
    assert_eq!(remote.document().items[0].quantity, 5);
}

#[tokio::test]
async fn test_edits_apply_on_top_of_the_latest_remote_item() {
    let x = stocked("X", 10);
    let id = x.id.clone();
    let remote = FakeRemote::with_items(vec![x]);
    let processor = replica(&remote, Some(ENDPOINT)).await;

    // another replica issued 6 after our last pull
    remote.document.lock().unwrap().items[0].quantity = 4;

    let mut draft = ItemDraft::from_item(&processor.synchronizer().store().items().await[0]);
    draft.description = "moved to shelf B".into();
    draft.quantity = 4;
    processor.edit_item(&id, draft).await.unwrap();

    let document = remote.document();
    assert_eq!(document.items[0].id, id);
    assert_eq!(document.items[0].description, "moved to shelf B");
}

#[tokio::test]
async fn test_periodic_pull_runs_until_shutdown() {
    let remote = FakeRemote::with_items(vec![]);
    let mut config = config(Some(ENDPOINT));
    config.remote.poll_interval_secs = 1;

    let sync = Arc::new(Synchronizer::new(store().await, remote.clone(), config));
    sync.initialize().await;
    let after_init = remote.pulls();

    let handle = sync.spawn();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    handle.shutdown().await.unwrap();

    let polled = remote.pulls();
    assert!(polled > after_init);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(remote.pulls(), polled);
}
