//! # Synchronizer
//!
//! Keeps the local replica aligned with the remote snapshot and publishes
//! the sync status.
//!
//! ## Status Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncStatus                                     │
//! │                                                                         │
//! │   no endpoint                                                          │
//! │  ┌─────────┐   set_endpoint(url)   ┌──────────┐   ok    ┌──────────┐   │
//! │  │  LOCAL  │ ────────────────────► │ SYNCING  │ ──────► │  SYNCED  │   │
//! │  └─────────┘                       └──────────┘         └──────────┘   │
//! │       ▲                              │     ▲                 │         │
//! │       │ set_endpoint("")             │fail │ pull / push     │         │
//! │       │ push without endpoint        ▼     │                 │         │
//! │       │                            ┌──────────┐              │         │
//! │       └─────────────────────────── │  ERROR   │ ◄────────────┘         │
//! │                                    └──────────┘   (next failure)       │
//! │                                                                         │
//! │  PERIODIC PULL: every poll_interval_secs, skipped while a commit is    │
//! │  in flight or another pull/push sequence holds the sync lock.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locks
//! `commit_lock` is only ever try-locked: a second commit is rejected, not
//! queued. `sync_lock` serializes every pull-apply-push sequence; commits
//! and manual pulls wait for it, the periodic tick skips when it is busy.

use std::sync::Arc;

use chrono::Local;
use safeman_core::Snapshot;
use safeman_db::LedgerStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{validate_endpoint, SafemanConfig};
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteSnapshotClient;

/// Wall-clock format of the last-sync display string.
pub const LAST_SYNC_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Shown in place of a last-sync time that was never recorded.
pub const NEVER_SYNCED: &str = "never synced";

// =============================================================================
// Sync Status
// =============================================================================

/// Replica sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No endpoint configured; the replica is standalone.
    #[default]
    Local,

    /// A pull or push is in flight.
    Syncing,

    /// The last pull or push succeeded.
    Synced,

    /// The last pull or push failed.
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Local => write!(f, "local"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of the synchronizer's externally visible state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,

    /// Active remote endpoint, if any.
    pub endpoint: Option<String>,

    /// Local wall-clock time of the last successful pull or push.
    pub last_sync_time: Option<String>,

    /// Message of the most recent failure. Cleared on success.
    pub last_error: Option<String>,
}

impl SyncState {
    /// Last-sync time for display.
    pub fn last_sync_display(&self) -> &str {
        self.last_sync_time.as_deref().unwrap_or(NEVER_SYNCED)
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync status changes (UI bindings, CLI output).
pub trait SyncEventEmitter: Send + Sync {
    /// Called after every status change.
    fn emit_status(&self, state: &SyncState);

    /// Called when a pull or push fails.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _state: &SyncState) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Synchronizer
// =============================================================================

/// Owns the sync status and the locks that serialize remote exchanges.
pub struct Synchronizer {
    store: Arc<LedgerStore>,
    remote: Arc<dyn RemoteSnapshotClient>,
    config: Arc<SafemanConfig>,
    state: Arc<RwLock<SyncState>>,
    emitter: Arc<dyn SyncEventEmitter>,
    commit_lock: Mutex<()>,
    sync_lock: Mutex<()>,
}

impl Synchronizer {
    /// Creates a synchronizer in `local` status. Call
    /// [`Synchronizer::initialize`] before use.
    pub fn new(
        store: Arc<LedgerStore>,
        remote: Arc<dyn RemoteSnapshotClient>,
        config: SafemanConfig,
    ) -> Self {
        Self::with_emitter(store, remote, config, Arc::new(NoOpEmitter))
    }

    /// Creates a synchronizer with a custom event emitter.
    pub fn with_emitter(
        store: Arc<LedgerStore>,
        remote: Arc<dyn RemoteSnapshotClient>,
        config: SafemanConfig,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        Synchronizer {
            store,
            remote,
            config: Arc::new(config),
            state: Arc::new(RwLock::new(SyncState::default())),
            emitter,
            commit_lock: Mutex::new(()),
            sync_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn config(&self) -> &SafemanConfig {
        &self.config
    }

    /// Returns the current sync state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Returns the active endpoint, if any.
    pub async fn endpoint(&self) -> Option<String> {
        self.state.read().await.endpoint.clone()
    }

    /// Whether a commit currently holds the in-progress guard.
    pub fn is_committing(&self) -> bool {
        self.commit_lock.try_lock().is_err()
    }

    /// Loads the mirror, resolves the endpoint and pulls once.
    ///
    /// ## What This Does
    /// 1. Seeds the store from the mirror
    /// 2. Picks the configured URL, else the URL stored in the mirror
    /// 3. Restores the last-sync display time
    /// 4. Pulls when an endpoint exists (a failure only sets `error`)
    ///
    /// ## Returns
    /// The working snapshot after startup.
    pub async fn initialize(&self) -> Snapshot {
        self.store.load().await;

        let endpoint = match self.config.remote_url() {
            Some(url) => Some(url.to_string()),
            None => self.store.remote_url().await,
        };
        let last_sync_time = self.store.last_sync().await;

        {
            let mut state = self.state.write().await;
            state.endpoint = endpoint.clone();
            state.last_sync_time = last_sync_time;
            state.status = SyncStatus::Local;
        }

        info!(endpoint = ?endpoint, "Synchronizer initialized");

        if endpoint.is_some() {
            if let Err(e) = self.pull().await {
                warn!(error = %e, "Initial pull failed, continuing with local mirror");
            }
        }

        self.store.snapshot().await
    }

    /// Pulls the remote snapshot and replaces the local replica with it.
    ///
    /// ## Returns
    /// * `Ok(None)` - No endpoint; status untouched
    /// * `Ok(Some(snapshot))` - Replica replaced, status `synced`
    /// * `Err(e)` - Status `error`, replica untouched
    pub async fn pull(&self) -> SyncResult<Option<Snapshot>> {
        let _sync = self.lock_sync().await;
        self.pull_locked().await
    }

    /// Pushes `snapshot` as the new remote document.
    ///
    /// Without an endpoint this only moves the status to `local`.
    pub async fn push(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let _sync = self.lock_sync().await;
        self.push_locked(snapshot).await
    }

    /// Changes (or, with a blank `url`, clears) the remote endpoint.
    ///
    /// A non-empty URL must be http(s); it is persisted and pulled from
    /// immediately. An invalid URL changes nothing.
    pub async fn set_endpoint(&self, url: &str) -> SyncResult<Option<Snapshot>> {
        let trimmed = url.trim();

        if trimmed.is_empty() {
            self.store.set_remote_url(None).await?;
            {
                let mut state = self.state.write().await;
                state.endpoint = None;
                state.status = SyncStatus::Local;
                state.last_error = None;
            }
            self.publish().await;
            info!("Remote endpoint cleared, replica is local");
            return Ok(None);
        }

        let endpoint = validate_endpoint(trimmed)?;
        self.store.set_remote_url(Some(&endpoint)).await?;
        self.state.write().await.endpoint = Some(endpoint.clone());
        info!(endpoint = %endpoint, "Remote endpoint set");

        self.pull().await
    }

    // =========================================================================
    // Guards (shared with TransactionProcessor)
    // =========================================================================

    /// Takes the commit guard, or fails with `CommitInProgress`.
    pub(crate) fn try_begin_commit(&self) -> SyncResult<MutexGuard<'_, ()>> {
        self.commit_lock
            .try_lock()
            .map_err(|_| SyncError::CommitInProgress)
    }

    pub(crate) async fn lock_sync(&self) -> MutexGuard<'_, ()> {
        self.sync_lock.lock().await
    }

    /// [`Synchronizer::pull`] for callers already holding the sync lock.
    pub(crate) async fn pull_locked(&self) -> SyncResult<Option<Snapshot>> {
        let Some(endpoint) = self.endpoint().await else {
            debug!("No endpoint, skipping pull");
            return Ok(None);
        };

        self.set_status(SyncStatus::Syncing).await;

        match self.remote.pull(&endpoint).await {
            Ok(remote) => {
                let snapshot = self.store.replace(remote).await;
                self.mark_synced().await;
                info!(
                    items = snapshot.items.len(),
                    logs = snapshot.logs.len(),
                    "Pulled remote snapshot"
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                warn!(error = %e, "Pull failed");
                self.mark_error(&e).await;
                Err(e)
            }
        }
    }

    /// [`Synchronizer::push`] for callers already holding the sync lock.
    pub(crate) async fn push_locked(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let Some(endpoint) = self.endpoint().await else {
            debug!("No endpoint, replica stays local");
            self.set_status(SyncStatus::Local).await;
            return Ok(());
        };

        self.set_status(SyncStatus::Syncing).await;

        match self.remote.push(&endpoint, snapshot).await {
            Ok(()) => {
                self.mark_synced().await;
                debug!(items = snapshot.items.len(), "Pushed snapshot");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Push failed");
                self.mark_error(&e).await;
                Err(e)
            }
        }
    }

    // =========================================================================
    // Periodic Pull
    // =========================================================================

    /// One tick of the background poll. Returns whether a pull ran.
    pub async fn periodic_tick(&self) -> bool {
        if self.endpoint().await.is_none() {
            return false;
        }

        if self.is_committing() {
            debug!("Commit in flight, skipping periodic pull");
            return false;
        }

        let Ok(_sync) = self.sync_lock.try_lock() else {
            debug!("Sync in progress, skipping periodic pull");
            return false;
        };

        if let Err(e) = self.pull_locked().await {
            debug!(error = %e, "Periodic pull failed");
        }
        true
    }

    /// Starts the periodic pull on the current tokio runtime.
    ///
    /// The first tick fires one interval from now; `initialize` has
    /// already pulled.
    pub fn spawn(self: &Arc<Self>) -> SynchronizerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(Arc::clone(self).run(shutdown_rx));

        SynchronizerHandle {
            shutdown_tx,
            state: Arc::clone(&self.state),
            task,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        let period = self.config.remote.poll_interval();
        info!(?period, "Periodic pull starting");

        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.periodic_tick().await;
                }

                _ = shutdown_rx.recv() => {
                    info!("Periodic pull shutting down");
                    break;
                }
            }
        }

        info!("Periodic pull stopped");
    }

    // =========================================================================
    // State Updates
    // =========================================================================

    async fn set_status(&self, status: SyncStatus) {
        self.state.write().await.status = status;
        self.publish().await;
    }

    async fn mark_synced(&self) {
        let now = Local::now().format(LAST_SYNC_FORMAT).to_string();
        if let Err(e) = self.store.set_last_sync(&now).await {
            error!(error = %e, "Failed to persist last sync time");
        }

        {
            let mut state = self.state.write().await;
            state.status = SyncStatus::Synced;
            state.last_sync_time = Some(now);
            state.last_error = None;
        }
        self.publish().await;
    }

    async fn mark_error(&self, err: &SyncError) {
        let message = err.to_string();
        {
            let mut state = self.state.write().await;
            state.status = SyncStatus::Error;
            state.last_error = Some(message.clone());
        }
        self.publish().await;
        self.emitter.emit_error(&message, err.is_retryable());
    }

    async fn publish(&self) {
        let state = self.state.read().await.clone();
        self.emitter.emit_status(&state);
    }
}

// =============================================================================
// Synchronizer Handle
// =============================================================================

/// Controls a running periodic pull.
pub struct SynchronizerHandle {
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<RwLock<SyncState>>,
    task: JoinHandle<()>,
}

impl SynchronizerHandle {
    /// Gets the current sync state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Stops the periodic pull and waits for the task to finish.
    pub async fn shutdown(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))?;

        self.task
            .await
            .map_err(|e| SyncError::ChannelError(e.to_string()))
    }
}
