//! # Reservation Tracker
//!
//! The operator's basket, bound to the ledger store so every reservation is
//! checked against the freshest known item quantities.
//!
//! The basket is client-local and never persisted. It lives behind a
//! `std::sync::Mutex` that is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use safeman_core::{Basket, BasketEntry, TransactionType};
use safeman_db::LedgerStore;
use tracing::debug;

use crate::error::SyncResult;

/// Stateful basket validated against the store's current snapshot.
pub struct ReservationTracker {
    store: Arc<LedgerStore>,
    basket: Mutex<Basket>,
}

impl ReservationTracker {
    pub fn new(store: Arc<LedgerStore>, mode: TransactionType) -> Self {
        ReservationTracker {
            store,
            basket: Mutex::new(Basket::new(mode)),
        }
    }

    fn basket(&self) -> MutexGuard<'_, Basket> {
        self.basket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mode(&self) -> TransactionType {
        self.basket().mode()
    }

    /// Switches mode. Switching to a different mode empties the basket.
    pub fn set_mode(&self, mode: TransactionType) {
        self.basket().set_mode(mode);
    }

    /// Reserves `quantity` of `item_id` against the store's current items.
    ///
    /// ## Returns
    /// * `Ok(entry)` - The added line
    /// * `Err(SyncError::Core(..))` - Non-positive quantity, unknown item,
    ///   or (OUT) more than is available after existing reservations
    pub async fn reserve(&self, item_id: &str, quantity: i64) -> SyncResult<BasketEntry> {
        let items = self.store.items().await;

        let mut basket = self.basket();
        let entry = basket.reserve(&items, item_id, quantity)?.clone();

        debug!(
            item_id = %item_id,
            quantity,
            reserved = basket.reserved_quantity(item_id),
            "Reserved"
        );
        Ok(entry)
    }

    /// Removes the line at `index`.
    pub fn release(&self, index: usize) -> SyncResult<BasketEntry> {
        Ok(self.basket().release(index)?)
    }

    pub fn reserved_quantity(&self, item_id: &str) -> i64 {
        self.basket().reserved_quantity(item_id)
    }

    /// Quantity still reservable for `item_id`, or `None` if the store does
    /// not know the item.
    pub async fn available(&self, item_id: &str) -> Option<i64> {
        let items = self.store.items().await;
        let item = items.iter().find(|i| i.id == item_id)?;
        Some(self.basket().available(item))
    }

    pub fn entries(&self) -> Vec<BasketEntry> {
        self.basket().entries().to_vec()
    }

    pub fn is_empty(&self) -> bool {
        self.basket().is_empty()
    }

    /// Copy of the basket as it stands now.
    pub fn current(&self) -> Basket {
        self.basket().clone()
    }

    pub fn clear(&self) {
        self.basket().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeman_core::{CoreError, Item, ItemDraft};
    use safeman_db::{Database, DbConfig};

    use crate::error::SyncError;

    async fn store_with(items: Vec<Item>) -> Arc<LedgerStore> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = Arc::new(LedgerStore::new(db));
        store.load().await;
        store.apply(|s| s.items = items).await;
        store
    }

    fn stocked(name: &str, quantity: i64) -> Item {
        let mut item = Item::from_draft(ItemDraft::new(name, "pc"), 0);
        item.quantity = quantity;
        item
    }

    #[tokio::test]
    async fn test_reserve_uses_current_store_quantity() {
        let x = stocked("X", 10);
        let id = x.id.clone();
        let store = store_with(vec![x]).await;
        let tracker = ReservationTracker::new(store.clone(), TransactionType::Out);

        tracker.reserve(&id, 6).await.unwrap();
        assert_eq!(tracker.available(&id).await, Some(4));

        // a pull lowered the quantity underneath the basket
        store.apply(|s| s.items[0].quantity = 7).await;
        let err = tracker.reserve(&id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Core(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));

        tracker.reserve(&id, 1).await.unwrap();
        assert_eq!(tracker.reserved_quantity(&id), 7);
    }

    #[tokio::test]
    async fn test_release_and_mode_switch() {
        let x = stocked("X", 3);
        let id = x.id.clone();
        let tracker = ReservationTracker::new(store_with(vec![x]).await, TransactionType::Out);

        tracker.reserve(&id, 1).await.unwrap();
        tracker.reserve(&id, 2).await.unwrap();
        assert_eq!(tracker.entries().len(), 2);

        let released = tracker.release(0).unwrap();
        assert_eq!(released.quantity, 1);
        assert!(tracker.release(5).is_err());

        tracker.set_mode(TransactionType::Out);
        assert!(!tracker.is_empty());

        tracker.set_mode(TransactionType::In);
        assert!(tracker.is_empty());
        assert_eq!(tracker.mode(), TransactionType::In);

        // restock has no upper bound
        tracker.reserve(&id, 500).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let tracker = ReservationTracker::new(store_with(vec![]).await, TransactionType::Out);
        assert!(tracker.reserve("missing", 1).await.is_err());
        assert_eq!(tracker.available("missing").await, None);
    }
}
