//! # Reservation Basket
//!
//! Client-local claims on quantity that has not been committed yet.
//!
//! ## Reservation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Basket Operations                                 │
//! │                                                                         │
//! │  Operator Action          Basket Call             Effect                │
//! │  ───────────────          ───────────             ──────                │
//! │                                                                         │
//! │  Pick item + qty ───────► reserve() ────────────► entries.push(entry)  │
//! │                           (OUT: qty ≤ available)                       │
//! │                                                                         │
//! │  Remove a line ─────────► release(index) ───────► entries.remove(i)    │
//! │                                                                         │
//! │  Toggle OUT ↔ IN ───────► set_mode() ───────────► entries.clear()      │
//! │                                                                         │
//! │  Commit done ───────────► clear() ──────────────► entries.clear()      │
//! │                                                                         │
//! │  available(item) = item.quantity - Σ entries for item                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reservations only stop one client from queuing more OUT lines than its
//! last-known stock supports. They give no guarantee across clients.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Item, ItemType, TransactionType};

/// One reserved line.
///
/// Display fields are frozen copies of the item when the line was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BasketEntry {
    pub item_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub spec: String,
    pub item_type: ItemType,
}

impl BasketEntry {
    /// Creates an entry from an item and quantity.
    pub fn from_item(item: &Item, quantity: i64) -> Self {
        BasketEntry {
            item_id: item.id.clone(),
            name: item.name.clone(),
            quantity,
            unit: item.unit.clone(),
            spec: item.spec.clone(),
            item_type: item.item_type,
        }
    }
}

/// The in-progress, not-yet-submitted operation.
///
/// ## Invariants
/// - Every entry has `quantity > 0`
/// - In OUT mode, when an entry is added, the per-item sum never exceeds
///   the item's quantity in the item list passed to [`Basket::reserve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    mode: TransactionType,
    entries: Vec<BasketEntry>,
}

impl Basket {
    /// Creates an empty basket in the given mode.
    pub fn new(mode: TransactionType) -> Self {
        Basket {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn mode(&self) -> TransactionType {
        self.mode
    }

    pub fn entries(&self) -> &[BasketEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total quantity already reserved for an item.
    pub fn reserved_quantity(&self, item_id: &str) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.item_id == item_id)
            .fold(0i64, |total, e| total.saturating_add(e.quantity))
    }

    /// On-hand quantity minus what this basket already holds.
    pub fn available(&self, item: &Item) -> i64 {
        item.quantity.saturating_sub(self.reserved_quantity(&item.id))
    }

    /// Adds a reservation line, validated against `items`.
    ///
    /// Pass the freshest item list the caller knows about; the quantity
    /// check uses it rather than whatever was current when the basket
    /// was opened.
    ///
    /// ## Rejections
    /// - `quantity <= 0` → [`ValidationError::MustBePositive`]
    /// - unknown id → [`CoreError::ItemNotFound`]
    /// - OUT mode and `quantity > available` → [`CoreError::InsufficientStock`]
    /// - IN mode and on-hand + reserved + `quantity` past `i64::MAX` →
    ///   [`ValidationError::TooLarge`]
    ///
    /// Exactly-equal is accepted.
    pub fn reserve(&mut self, items: &[Item], item_id: &str, quantity: i64) -> CoreResult<&BasketEntry> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let item = items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        if self.mode == TransactionType::In {
            // On-hand plus every IN line for the item must stay representable.
            let headroom = i64::MAX
                .saturating_sub(item.quantity.max(0))
                .saturating_sub(self.reserved_quantity(item_id));
            if quantity > headroom {
                return Err(ValidationError::TooLarge {
                    field: "quantity".to_string(),
                    max: headroom,
                }
                .into());
            }
        }

        if self.mode == TransactionType::Out {
            let available = self.available(item);
            if quantity > available {
                return Err(CoreError::InsufficientStock {
                    item_id: item_id.to_string(),
                    available,
                    requested: quantity,
                });
            }
        }

        self.entries.push(BasketEntry::from_item(item, quantity));
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Removes the line at `index`.
    pub fn release(&mut self, index: usize) -> CoreResult<BasketEntry> {
        if index >= self.entries.len() {
            return Err(CoreError::InvalidBasketIndex {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Switches between OUT and IN. A real switch drops every line.
    pub fn set_mode(&mut self, mode: TransactionType) {
        if self.mode != mode {
            self.mode = mode;
            self.entries.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for Basket {
    fn default() -> Self {
        Basket::new(TransactionType::Out)
    }
}
