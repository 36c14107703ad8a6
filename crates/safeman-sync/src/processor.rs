//! # Transaction Processor
//!
//! Turns a basket (or a single item edit) into a persisted ledger change,
//! using refresh-then-apply-then-push to narrow the lost-update window.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          commit(tracker, request)                       │
//! │                                                                         │
//! │  basket empty? ───────────────────────────────► Err(EmptyBasket)        │
//! │       │                                                                 │
//! │  commit_lock.try_lock() ── held ──────────────► Err(CommitInProgress)   │
//! │       │                                                                 │
//! │  sync_lock.lock().await                                                │
//! │       │                                                                 │
//! │  1. REFRESH   pull → store.replace       (fail / no endpoint: local)   │
//! │       │                                                                 │
//! │  2. APPLY     store.apply(apply_basket)  (clamp ≥ 0, prepend logs)     │
//! │       │                                                                 │
//! │  3. PUSH      post full snapshot         (fail: status = error only)   │
//! │       │                                                                 │
//! │  4. CLEAR     basket emptied, batch returned                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Remote and mirror failures inside the sequence never fail the commit;
//! they show up in the sync status and the log. The local apply always
//! happens once the guard is taken.

use std::sync::Arc;

use chrono::Utc;
use safeman_core::ledger::{self, IssuanceMeta};
use safeman_core::validation::{validate_dept, validate_draft};
use safeman_core::{IssuanceBatch, Item, ItemDraft, Snapshot, TransactionType};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::reservation::ReservationTracker;
use crate::synchronizer::Synchronizer;

// =============================================================================
// Issuance Request
// =============================================================================

/// Operator-entered details for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuanceRequest {
    /// Receiving department. Required for OUT; ignored for IN, which
    /// records the configured receiving department.
    pub dept: String,

    /// Blank is recorded as the unspecified-person placeholder.
    pub person: String,

    pub reason: String,
}

impl IssuanceRequest {
    pub fn new(dept: impl Into<String>, person: impl Into<String>, reason: impl Into<String>) -> Self {
        IssuanceRequest {
            dept: dept.into(),
            person: person.into(),
            reason: reason.into(),
        }
    }

    /// A restock request; the department comes from configuration.
    pub fn restock(person: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(String::new(), person, reason)
    }
}

// =============================================================================
// Transaction Processor
// =============================================================================

/// Runs commits, item edits and imports against the synchronizer's replica.
pub struct TransactionProcessor {
    sync: Arc<Synchronizer>,
}

impl TransactionProcessor {
    pub fn new(sync: Arc<Synchronizer>) -> Self {
        TransactionProcessor { sync }
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    /// Commits the tracker's basket.
    ///
    /// ## Returns
    /// * `Ok(batch)` - Applied locally (and pushed, if the push succeeded);
    ///   the basket is now empty
    /// * `Err(EmptyBasket)` / `Err(CommitInProgress)` - Nothing changed
    /// * `Err(Core(Validation(..)))` - OUT without a department; nothing changed
    pub async fn commit(
        &self,
        tracker: &ReservationTracker,
        request: IssuanceRequest,
    ) -> SyncResult<IssuanceBatch> {
        let basket = tracker.current();
        if basket.is_empty() {
            return Err(SyncError::EmptyBasket);
        }
        let meta = self.issuance_meta(basket.mode(), &request)?;

        let _commit = self.sync.try_begin_commit()?;
        let _sync = self.sync.lock_sync().await;

        self.refresh_basis().await;

        let now = Utc::now().timestamp_millis();
        let (snapshot, batch) = self
            .sync
            .store()
            .apply(|s| ledger::apply_basket(s, &basket, &meta, now))
            .await;

        if !batch.missing_items.is_empty() {
            warn!(
                missing = ?batch.missing_items,
                "Basket items no longer exist, recorded in log only"
            );
        }

        self.push_quietly(&snapshot).await;
        tracker.clear();

        info!(
            batch_id = %batch.id,
            mode = %batch.mode,
            lines = batch.entries.len(),
            dept = %batch.dept,
            "Commit applied"
        );
        Ok(batch)
    }

    /// Adds a new item built from `draft`.
    pub async fn add_item(&self, draft: ItemDraft) -> SyncResult<Item> {
        validate_draft(&draft)?;

        let _commit = self.sync.try_begin_commit()?;
        let _sync = self.sync.lock_sync().await;

        self.refresh_basis().await;

        let now = Utc::now().timestamp_millis();
        let (snapshot, item) = self
            .sync
            .store()
            .apply(|s| ledger::add_item(s, draft, now))
            .await;

        self.push_quietly(&snapshot).await;

        info!(item_id = %item.id, name = %item.name, "Item added");
        Ok(item)
    }

    /// Merges `draft` over the latest copy of item `id`.
    ///
    /// An id missing from the refreshed basis fails with `ItemNotFound` and
    /// nothing is pushed.
    pub async fn edit_item(&self, id: &str, draft: ItemDraft) -> SyncResult<Item> {
        validate_draft(&draft)?;

        let _commit = self.sync.try_begin_commit()?;
        let _sync = self.sync.lock_sync().await;

        self.refresh_basis().await;

        let now = Utc::now().timestamp_millis();
        let (snapshot, edited) = self
            .sync
            .store()
            .apply(|s| ledger::edit_item(s, id, draft, now))
            .await;
        let item = edited?;

        self.push_quietly(&snapshot).await;

        info!(item_id = %item.id, "Item edited");
        Ok(item)
    }

    /// Hard-deletes item `id`. Its log entries remain.
    pub async fn delete_item(&self, id: &str) -> SyncResult<Item> {
        let _commit = self.sync.try_begin_commit()?;
        let _sync = self.sync.lock_sync().await;

        self.refresh_basis().await;

        let now = Utc::now().timestamp_millis();
        let (snapshot, deleted) = self
            .sync
            .store()
            .apply(|s| ledger::delete_item(s, id, now))
            .await;
        let item = deleted?;

        self.push_quietly(&snapshot).await;

        info!(item_id = %item.id, name = %item.name, "Item deleted");
        Ok(item)
    }

    /// Replaces the replica with `snapshot` and pushes it.
    ///
    /// No refresh: the import overwrites the basis entirely. The timestamp
    /// is restamped to now.
    pub async fn import_snapshot(&self, mut snapshot: Snapshot) -> SyncResult<Snapshot> {
        let _commit = self.sync.try_begin_commit()?;
        let _sync = self.sync.lock_sync().await;

        snapshot.timestamp = Utc::now().timestamp_millis();
        let stored = self.sync.store().replace(snapshot).await;

        self.push_quietly(&stored).await;

        info!(
            items = stored.items.len(),
            logs = stored.logs.len(),
            "Snapshot imported"
        );
        Ok(stored)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn issuance_meta(&self, mode: TransactionType, request: &IssuanceRequest) -> SyncResult<IssuanceMeta> {
        let dept = match mode {
            TransactionType::Out => {
                validate_dept(&request.dept)?;
                request.dept.trim().to_string()
            }
            TransactionType::In => self.sync.config().issuance.receiving_dept.clone(),
        };

        Ok(IssuanceMeta::new(dept, request.person.trim(), request.reason.trim()))
    }

    /// Pulls the latest snapshot as the basis; keeps the local one if that
    /// is not possible. Caller holds the sync lock.
    async fn refresh_basis(&self) {
        match self.sync.pull_locked().await {
            Ok(Some(_)) => debug!("Basis refreshed from remote"),
            Ok(None) => debug!("No endpoint, using local basis"),
            Err(e) => warn!(error = %e, "Refresh failed, applying to local basis"),
        }
    }

    async fn push_quietly(&self, snapshot: &Snapshot) {
        if let Err(e) = self.sync.push_locked(snapshot).await {
            warn!(error = %e, "Push failed, change kept locally");
        }
    }
}
