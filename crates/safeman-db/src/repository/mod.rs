//! # Repository Module
//!
//! SQL access for the SafeMan mirror.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LedgerStore                                                           │
//! │       │                                                                 │
//! │       │  db.mirror().put("safeman_items", json)                        │
//! │       ▼                                                                 │
//! │  MirrorRepository                                                      │
//! │  ├── get(&self, key)                                                   │
//! │  ├── put(&self, key, value)                                            │
//! │  └── remove(&self, key)                                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite `mirror` table                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod mirror;
