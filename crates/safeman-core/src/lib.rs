//! # safeman-core: Pure Ledger Logic for SafeMan
//!
//! This crate holds the inventory model shared by every replica: items, the
//! transaction log, the snapshot exchanged with the remote store, and the
//! basket of not-yet-committed quantity claims. Everything here is a pure
//! function over those values.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SafeMan Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Operator CLI (apps/cli)                      │   │
//! │  │    items ──► issue / restock ──► export / import ──► watch      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          safeman-sync (Synchronizer, TransactionProcessor)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ safeman-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  basket   │  │  ledger   │  │ validation│  │   │
//! │  │   │   Item    │  │  Basket   │  │ apply_    │  │   drafts  │  │   │
//! │  │   │ Snapshot  │  │  reserve  │  │  basket   │  │   dates   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  safeman-db (Local Mirror)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Wire types (Item, Transaction, Snapshot, ...)
//! - [`basket`] - Reservation basket with oversell protection
//! - [`ledger`] - Applying baskets and item edits to a snapshot
//! - [`validation`] - Input validation for item drafts
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use safeman_core::basket::Basket;
//! use safeman_core::ledger::{apply_basket, IssuanceMeta};
//! use safeman_core::types::{Item, ItemDraft, Snapshot, TransactionType};
//!
//! let mut snapshot = Snapshot::empty();
//! let item = Item::from_draft(ItemDraft::new("N95 Mask", "box"), 0);
//! let id = item.id.clone();
//! snapshot.items.push(Item { quantity: 10, ..item });
//!
//! let mut basket = Basket::new(TransactionType::Out);
//! basket.reserve(&snapshot.items, &id, 4).unwrap();
//!
//! let meta = IssuanceMeta::new("South Team 1", "Chen", "monthly drill");
//! let applied = apply_basket(&mut snapshot, &basket, &meta, 1_700_000_000_000);
//!
//! assert_eq!(snapshot.items[0].quantity, 6);
//! assert_eq!(applied.transactions.len(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod basket;
pub mod error;
pub mod ledger;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use basket::{Basket, BasketEntry};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Person recorded on a log entry when the operator leaves the field blank.
pub const UNSPECIFIED_PERSON: &str = "未填寫";

/// Department recorded on restock (IN) entries unless configured otherwise.
pub const DEFAULT_RECEIVING_DEPT: &str = "修護處南部分處";

/// Departments offered for issuance (OUT) out of the box.
pub const DEFAULT_DEPARTMENTS: &[&str] = &[
    "工安組",
    "品質組",
    "供應組",
    "南一隊",
    "南二隊",
    "南三隊",
    "南四隊",
    "人資、政風、主任室",
];
