//! # safeman-sync: Replica Sync and Transactional Issuance
//!
//! This crate keeps a SafeMan replica aligned with the shared remote
//! snapshot and applies issuance, restock and item edits against the most
//! recent known state.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Replica Sync Architecture                           │
//! │                                                                         │
//! │  CLI / UI event                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌────────────────────┐      ┌──────────────────────────────────────┐  │
//! │  │ ReservationTracker │─────►│        TransactionProcessor          │  │
//! │  │ basket vs. fresh   │      │ guard → refresh → apply → push       │  │
//! │  │ item quantities    │      └──────────────────┬───────────────────┘  │
//! │  └────────────────────┘                         │                       │
//! │                                                 ▼                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                        Synchronizer                              │  │
//! │  │  status: local / syncing / synced / error                        │  │
//! │  │  commit_lock + sync_lock, periodic pull every 15s                │  │
//! │  └───────────────┬──────────────────────────────────┬───────────────┘  │
//! │                  ▼                                  ▼                   │
//! │  ┌────────────────────────────┐     ┌──────────────────────────────┐   │
//! │  │ RemoteSnapshotClient       │     │ LedgerStore (safeman-db)     │   │
//! │  │ GET / POST full snapshot   │     │ in-memory + SQLite mirror    │   │
//! │  └────────────────────────────┘     └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Replica configuration (remote, store, issuance)
//! - [`error`] - Sync error types
//! - [`processor`] - Commits, item edits, import
//! - [`remote`] - HTTP snapshot client and retry wrapper
//! - [`reservation`] - Basket bound to the ledger store
//! - [`synchronizer`] - Status machine and periodic pull
//! - [`transfer`] - Backup file export and import
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use safeman_db::{Database, DbConfig, LedgerStore};
//! use safeman_sync::{remote, IssuanceRequest, ReservationTracker, SafemanConfig,
//!                    Synchronizer, TransactionProcessor};
//!
//! let config = SafemanConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(config.database_path())).await?;
//! let store = Arc::new(LedgerStore::new(db));
//! let client = remote::client_from_settings(&config.remote)?;
//!
//! let sync = Arc::new(Synchronizer::new(store.clone(), client, config));
//! sync.initialize().await;
//! let poller = sync.spawn();
//!
//! let tracker = ReservationTracker::new(store, TransactionType::Out);
//! tracker.reserve("item-id", 2).await?;
//!
//! let processor = TransactionProcessor::new(sync.clone());
//! let batch = processor.commit(&tracker, IssuanceRequest::new("南一隊", "Chen", "")).await?;
//!
//! poller.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod processor;
pub mod remote;
pub mod reservation;
pub mod synchronizer;
pub mod transfer;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{IssuanceSettings, RemoteSettings, SafemanConfig, StoreSettings};
pub use error::{SyncError, SyncResult};
pub use processor::{IssuanceRequest, TransactionProcessor};
pub use remote::{HttpSnapshotClient, RemoteSnapshotClient, RetryingClient};
pub use reservation::ReservationTracker;
pub use synchronizer::{
    NoOpEmitter, SyncEventEmitter, SyncState, SyncStatus, Synchronizer, SynchronizerHandle,
};
