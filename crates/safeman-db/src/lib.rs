//! # safeman-db: Local Mirror for SafeMan
//!
//! This crate keeps the replica's durable local copy. It uses SQLite through
//! sqlx, with one key/value table holding the items, the logs and two
//! settings.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SafeMan Data Flow                                │
//! │                                                                         │
//! │  TransactionProcessor / Synchronizer (safeman-sync)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    safeman-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LedgerStore  │    │   Database    │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │   (pool.rs)   │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ RwLock<Snap>  │───►│ MirrorRepo    │    │ 001_init.sql │  │   │
//! │  │   │ load / apply  │    │ SqlitePool    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              SQLite file (~/.local/share/safeman/...)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use safeman_db::{Database, DbConfig, LedgerStore};
//!
//! let db = Database::new(DbConfig::new("safeman.db")).await?;
//! let store = LedgerStore::new(db);
//! let snapshot = store.load().await;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::mirror::MirrorRepository;
pub use store::LedgerStore;
