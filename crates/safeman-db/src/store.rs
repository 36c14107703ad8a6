//! # Ledger Store
//!
//! The replica's working copy of items and logs, mirrored to SQLite.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LedgerStore Lifecycle                            │
//! │                                                                         │
//! │  new(db) ─────► state = empty, loaded = false                          │
//! │                    │                                                    │
//! │                    │  save()/apply()/replace() before load:             │
//! │                    │  memory only, mirror untouched                     │
//! │                    ▼                                                    │
//! │  load() ──────► items ← mirror["safeman_items"]  (bad/missing → [])    │
//! │                 logs  ← mirror["safeman_logs"]   (bad/missing → [])    │
//! │                 loaded = true                                           │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │  apply(f) ────► f(&mut state) → write items → write logs               │
//! │  replace(s) ──► state = s     → write items → write logs               │
//! │                                                                         │
//! │  Mirror failures are logged; in-memory state stays authoritative.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The load-completion flag keeps an empty startup state from overwriting a
//! good mirror before the mirror has been read.

use std::sync::atomic::{AtomicBool, Ordering};

use safeman_core::{Item, Snapshot, Transaction};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;

// =============================================================================
// Mirror Keys
// =============================================================================

pub const ITEMS_KEY: &str = "safeman_items";
pub const LOGS_KEY: &str = "safeman_logs";
pub const REMOTE_URL_KEY: &str = "safeman_remote_url";
pub const LAST_SYNC_KEY: &str = "safeman_last_sync";

// =============================================================================
// Ledger Store
// =============================================================================

/// In-memory snapshot with a durable SQLite mirror.
#[derive(Debug)]
pub struct LedgerStore {
    db: Database,
    state: RwLock<Snapshot>,
    loaded: AtomicBool,
}

impl LedgerStore {
    /// Creates an empty, not-yet-loaded store.
    pub fn new(db: Database) -> Self {
        LedgerStore {
            db,
            state: RwLock::new(Snapshot::empty()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Seeds the store from the mirror.
    ///
    /// Items and logs are read independently; whichever one is missing,
    /// unreadable or unparsable comes back empty. Never fails.
    pub async fn load(&self) -> Snapshot {
        let items: Vec<Item> = self.read_list(ITEMS_KEY).await;
        let logs: Vec<Transaction> = self.read_list(LOGS_KEY).await;

        let mut state = self.state.write().await;
        *state = Snapshot {
            items,
            logs,
            timestamp: 0,
        };
        self.loaded.store(true, Ordering::SeqCst);

        info!(
            items = state.items.len(),
            logs = state.logs.len(),
            "Ledger loaded from mirror"
        );
        state.clone()
    }

    /// Whether [`LedgerStore::load`] has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Clone of the current snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    /// Clone of the current item list.
    pub async fn items(&self) -> Vec<Item> {
        self.state.read().await.items.clone()
    }

    /// Writes items, then logs, to the mirror.
    ///
    /// A no-op until the initial load has completed.
    pub async fn save(&self, snapshot: &Snapshot) -> DbResult<()> {
        if !self.is_loaded() {
            debug!("Mirror not loaded yet, skipping save");
            return Ok(());
        }

        let mirror = self.db.mirror();

        let items = serde_json::to_string(&snapshot.items).map_err(|e| DbError::corrupt(ITEMS_KEY, e))?;
        mirror.put(ITEMS_KEY, &items).await?;

        let logs = serde_json::to_string(&snapshot.logs).map_err(|e| DbError::corrupt(LOGS_KEY, e))?;
        mirror.put(LOGS_KEY, &logs).await?;

        Ok(())
    }

    /// Replaces the whole working copy and mirrors it.
    pub async fn replace(&self, snapshot: Snapshot) -> Snapshot {
        let (snapshot, ()) = self.apply(move |state| *state = snapshot).await;
        snapshot
    }

    /// Runs `mutation` against the working copy, mirrors the result, and
    /// returns the new snapshot with the mutation's own return value.
    ///
    /// The write lock is held until the mirror write finishes, so mirror
    /// writes land in the same order as the in-memory mutations.
    pub async fn apply<F, R>(&self, mutation: F) -> (Snapshot, R)
    where
        F: FnOnce(&mut Snapshot) -> R,
    {
        let mut state = self.state.write().await;
        let result = mutation(&mut *state);
        let snapshot = state.clone();

        if let Err(e) = self.save(&snapshot).await {
            warn!(error = %e, transient = e.is_transient(), "Failed to mirror ledger state");
        }

        (snapshot, result)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Remote snapshot endpoint last configured on this replica.
    pub async fn remote_url(&self) -> Option<String> {
        match self.db.mirror().get(REMOTE_URL_KEY).await {
            Ok(url) => url.filter(|u| !u.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read remote URL from mirror");
                None
            }
        }
    }

    /// Stores (or clears, with `None`) the remote endpoint.
    pub async fn set_remote_url(&self, url: Option<&str>) -> DbResult<()> {
        let mirror = self.db.mirror();
        match url {
            Some(url) => mirror.put(REMOTE_URL_KEY, url).await,
            None => mirror.remove(REMOTE_URL_KEY).await.map(|_| ()),
        }
    }

    /// Display string of the last successful sync.
    pub async fn last_sync(&self) -> Option<String> {
        match self.db.mirror().get(LAST_SYNC_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read last sync time from mirror");
                None
            }
        }
    }

    pub async fn set_last_sync(&self, text: &str) -> DbResult<()> {
        self.db.mirror().put(LAST_SYNC_KEY, text).await
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let raw = match self.db.mirror().get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "Mirror read failed, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Option<Vec<T>>>(&raw) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                warn!(key = %key, error = %e, "Mirror value unparsable, starting empty");
                Vec::new()
            }
        }
    }
}
