//! # Ledger Math
//!
//! Pure mutations of a [`Snapshot`]: committing a basket, and the single-item
//! add/edit/delete operations. The caller picks the basis snapshot (freshly
//! pulled, or local on fallback); these functions never look anywhere else.
//!
//! ## Commit Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  basis snapshot            basket (mode OUT)         result             │
//! │  ──────────────            ─────────────────         ──────             │
//! │  X: qty 10         ◄────── X × 4          ────────►  X: qty 6           │
//! │  Y: qty 2          ◄────── Y × 5          ────────►  Y: qty 0 (clamped) │
//! │                                                                         │
//! │  logs: [old1, old2]                       ────────►  logs: [tX, tY,     │
//! │                                                          old1, old2]    │
//! │                                                                         │
//! │  tX, tY share one timestamp and carry frozen name/spec/unit             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone};
use uuid::Uuid;

use crate::basket::Basket;
use crate::error::{CoreError, CoreResult};
use crate::types::{IssuanceBatch, Item, ItemDraft, ItemGroup, Snapshot, Transaction, TransactionType};
use crate::UNSPECIFIED_PERSON;

// =============================================================================
// Issuance Metadata
// =============================================================================

/// Who, where and why for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssuanceMeta {
    pub dept: String,
    pub person: String,
    pub reason: String,
}

impl IssuanceMeta {
    pub fn new(dept: impl Into<String>, person: impl Into<String>, reason: impl Into<String>) -> Self {
        IssuanceMeta {
            dept: dept.into(),
            person: person.into(),
            reason: reason.into(),
        }
    }

    /// Person to record, substituting the placeholder for a blank entry.
    pub fn recorded_person(&self) -> &str {
        let person = self.person.trim();
        if person.is_empty() {
            UNSPECIFIED_PERSON
        } else {
            person
        }
    }
}

// =============================================================================
// Basket Application
// =============================================================================

/// Applies every basket line to `snapshot` and prepends the log entries.
///
/// ## Rules
/// - IN adds the line quantity (saturating at `i64::MAX`); OUT subtracts
///   and clamps at zero
/// - Touched items get `last_updated = now_ms`
/// - One transaction per line, all stamped `now_ms`, in basket order,
///   placed ahead of the existing log
/// - Name/spec/unit come from the basis item; if the item has vanished the
///   basket's frozen copy is used and the id is reported in `missing_items`
///
/// The returned batch is what slip renderers consume.
pub fn apply_basket(snapshot: &mut Snapshot, basket: &Basket, meta: &IssuanceMeta, now_ms: i64) -> IssuanceBatch {
    let mode = basket.mode();
    let person = meta.recorded_person().to_string();
    let mut transactions = Vec::with_capacity(basket.len());
    let mut missing_items = Vec::new();

    for entry in basket.entries() {
        let (item_name, spec, unit) = match snapshot.items.iter_mut().find(|i| i.id == entry.item_id) {
            Some(item) => {
                item.quantity = match mode {
                    TransactionType::In => item.quantity.saturating_add(entry.quantity),
                    TransactionType::Out => (item.quantity - entry.quantity).max(0),
                };
                item.last_updated = now_ms;
                (item.name.clone(), item.spec.clone(), item.unit.clone())
            }
            None => {
                missing_items.push(entry.item_id.clone());
                (entry.name.clone(), entry.spec.clone(), entry.unit.clone())
            }
        };

        transactions.push(Transaction {
            id: Uuid::new_v4().to_string(),
            item_id: entry.item_id.clone(),
            item_name,
            spec,
            unit,
            kind: mode,
            quantity: entry.quantity,
            person: person.clone(),
            dept: meta.dept.clone(),
            reason: meta.reason.clone(),
            timestamp: now_ms,
        });
    }

    let mut logs = transactions.clone();
    logs.append(&mut snapshot.logs);
    snapshot.logs = logs;
    snapshot.timestamp = now_ms;

    IssuanceBatch {
        id: Uuid::new_v4().to_string(),
        mode,
        dept: meta.dept.clone(),
        person,
        reason: meta.reason.clone(),
        entries: basket.entries().to_vec(),
        timestamp: now_ms,
        transactions,
        missing_items,
    }
}

// =============================================================================
// Single-Item Mutations
// =============================================================================

/// Appends a new item built from `draft`. Returns a copy of it.
pub fn add_item(snapshot: &mut Snapshot, draft: ItemDraft, now_ms: i64) -> Item {
    let item = Item::from_draft(draft, now_ms);
    snapshot.items.push(item.clone());
    snapshot.timestamp = now_ms;
    item
}

/// Merges `draft` over the item with `id`.
pub fn edit_item(snapshot: &mut Snapshot, id: &str, draft: ItemDraft, now_ms: i64) -> CoreResult<Item> {
    let item = snapshot
        .items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| CoreError::ItemNotFound(id.to_string()))?;
    item.merge_draft(draft, now_ms);
    let edited = item.clone();
    snapshot.timestamp = now_ms;
    Ok(edited)
}

/// Hard-deletes the item with `id`. Its log entries stay untouched.
pub fn delete_item(snapshot: &mut Snapshot, id: &str, now_ms: i64) -> CoreResult<Item> {
    let index = snapshot
        .items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| CoreError::ItemNotFound(id.to_string()))?;
    snapshot.timestamp = now_ms;
    Ok(snapshot.items.remove(index))
}

// =============================================================================
// Read-Only Projections
// =============================================================================

/// Items at or below their reorder threshold.
pub fn low_stock(items: &[Item]) -> Vec<&Item> {
    items.iter().filter(|i| i.is_low_stock()).collect()
}

pub fn filter_group(items: &[Item], group: ItemGroup) -> Vec<&Item> {
    items.iter().filter(|i| i.item_group == group).collect()
}

/// OUT totals per department for one calendar year in `tz`, largest first.
pub fn issued_by_department<Tz: TimeZone>(logs: &[Transaction], year: i32, tz: &Tz) -> Vec<(String, i64)> {
    let mut totals: HashMap<&str, i64> = HashMap::new();

    for log in logs.iter().filter(|l| l.kind == TransactionType::Out) {
        let in_year = DateTime::from_timestamp_millis(log.timestamp)
            .map(|t| t.with_timezone(tz).year() == year)
            .unwrap_or(false);
        if in_year {
            *totals.entry(log.dept.as_str()).or_insert(0) += log.quantity;
        }
    }

    let mut ranking: Vec<(String, i64)> = totals.into_iter().map(|(d, q)| (d.to_string(), q)).collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn stocked(name: &str, quantity: i64) -> Item {
        let mut item = Item::from_draft(ItemDraft::new(name, "pc"), 0);
        item.quantity = quantity;
        item
    }

    fn snapshot_of(items: Vec<Item>) -> Snapshot {
        Snapshot {
            items,
            logs: Vec::new(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_out_commit_decrements_and_logs() {
        let x = stocked("X", 10);
        let mut snap = snapshot_of(vec![x.clone()]);
        let mut basket = Basket::new(TransactionType::Out);
        basket.reserve(&snap.items, &x.id, 4).unwrap();

        let batch = apply_basket(&mut snap, &basket, &IssuanceMeta::new("工安組", "Lin", "drill"), 1000);

        assert_eq!(snap.items[0].quantity, 6);
        assert_eq!(snap.items[0].last_updated, 1000);
        assert_eq!(snap.logs.len(), 1);
        assert_eq!(snap.logs[0].kind, TransactionType::Out);
        assert_eq!(snap.logs[0].quantity, 4);
        assert_eq!(snap.timestamp, 1000);
        assert_eq!(batch.transactions, snap.logs);
        assert!(batch.missing_items.is_empty());
    }

    #[test]
    fn test_out_commit_clamps_at_zero() {
        let x = stocked("X", 10);
        let mut basket = Basket::new(TransactionType::Out);
        basket.reserve(&[x.clone()], &x.id, 8).unwrap();

        // Basis pulled after another client already issued 7.
        let mut latest = snapshot_of(vec![Item { quantity: 3, ..x.clone() }]);
        apply_basket(&mut latest, &basket, &IssuanceMeta::default(), 1);

        assert_eq!(latest.items[0].quantity, 0);
        assert_eq!(latest.logs[0].quantity, 8);
    }

    #[test]
    fn test_in_commit_saturates_instead_of_wrapping() {
        let x = stocked("X", 0);
        let mut basket = Basket::new(TransactionType::In);
        basket.reserve(&[x.clone()], &x.id, i64::MAX).unwrap();

        // The refreshed basis already holds 5 more than when the line was added.
        let mut latest = snapshot_of(vec![Item { quantity: 5, ..x.clone() }]);
        apply_basket(&mut latest, &basket, &IssuanceMeta::default(), 1);

        assert_eq!(latest.items[0].quantity, i64::MAX);
        assert_eq!(latest.logs[0].quantity, i64::MAX);
    }

    #[test]
    fn test_in_commit_two_items_share_timestamp() {
        let a = stocked("A", 1);
        let b = stocked("B", 2);
        let mut snap = snapshot_of(vec![a.clone(), b.clone()]);
        snap.logs.push(Transaction {
            id: "old".into(),
            item_id: a.id.clone(),
            item_name: "A".into(),
            spec: String::new(),
            unit: "pc".into(),
            kind: TransactionType::Out,
            quantity: 1,
            person: "x".into(),
            dept: "y".into(),
            reason: String::new(),
            timestamp: 10,
        });
        let old_head = snap.logs[0].clone();

        let mut basket = Basket::new(TransactionType::In);
        basket.reserve(&snap.items, &a.id, 3).unwrap();
        basket.reserve(&snap.items, &b.id, 5).unwrap();
        apply_basket(&mut snap, &basket, &IssuanceMeta::new("修護處南部分處", "", ""), 500);

        assert_eq!(snap.items[0].quantity, 4);
        assert_eq!(snap.items[1].quantity, 7);
        assert_eq!(snap.logs.len(), 3);
        assert_eq!(snap.logs[0].item_id, a.id);
        assert_eq!(snap.logs[1].item_id, b.id);
        assert!(snap.logs[..2].iter().all(|l| l.kind == TransactionType::In && l.timestamp == 500));
        assert_eq!(snap.logs[2], old_head);
    }

    #[test]
    fn test_blank_person_gets_placeholder() {
        let x = stocked("X", 1);
        let mut snap = snapshot_of(vec![x.clone()]);
        let mut basket = Basket::new(TransactionType::In);
        basket.reserve(&snap.items, &x.id, 1).unwrap();

        let batch = apply_basket(&mut snap, &basket, &IssuanceMeta::new("d", "   ", "r"), 1);
        assert_eq!(batch.person, UNSPECIFIED_PERSON);
        assert_eq!(snap.logs[0].person, UNSPECIFIED_PERSON);
    }

    #[test]
    fn test_vanished_item_still_logged() {
        let x = stocked("X", 5);
        let mut basket = Basket::new(TransactionType::Out);
        basket.reserve(&[x.clone()], &x.id, 2).unwrap();

        let mut latest = Snapshot::empty();
        let batch = apply_basket(&mut latest, &basket, &IssuanceMeta::default(), 1);

        assert_eq!(batch.missing_items, vec![x.id.clone()]);
        assert_eq!(latest.logs[0].item_name, "X");
        assert!(latest.items.is_empty());
    }

    #[test]
    fn test_deleted_item_history_keeps_frozen_fields() {
        let mut y = stocked("Y", 5);
        y.spec = "L".to_string();
        let mut snap = snapshot_of(vec![y.clone()]);
        let mut basket = Basket::new(TransactionType::Out);
        basket.reserve(&snap.items, &y.id, 1).unwrap();
        apply_basket(&mut snap, &basket, &IssuanceMeta::default(), 1);

        delete_item(&mut snap, &y.id, 2).unwrap();

        assert!(snap.item(&y.id).is_none());
        assert_eq!(snap.logs[0].item_name, "Y");
        assert_eq!(snap.logs[0].spec, "L");
        assert_eq!(snap.logs[0].unit, "pc");
    }

    #[test]
    fn test_edit_and_delete_missing_item() {
        let mut snap = Snapshot::empty();
        assert!(matches!(
            edit_item(&mut snap, "nope", ItemDraft::new("a", "b"), 1),
            Err(CoreError::ItemNotFound(_))
        ));
        assert!(matches!(delete_item(&mut snap, "nope", 1), Err(CoreError::ItemNotFound(_))));
    }

    #[test]
    fn test_add_then_edit_item() {
        let mut snap = Snapshot::empty();
        let added = add_item(&mut snap, ItemDraft::new("Mask", "box"), 10);
        assert_eq!(snap.items.len(), 1);

        let mut draft = ItemDraft::from_item(&added);
        draft.min_stock = 3;
        let edited = edit_item(&mut snap, &added.id, draft, 20).unwrap();
        assert_eq!(edited.id, added.id);
        assert_eq!(snap.items[0].min_stock, 3);
        assert_eq!(snap.items[0].last_updated, 20);
    }

    #[test]
    fn test_projections() {
        let mut a = stocked("A", 2);
        a.min_stock = 5;
        let mut b = stocked("B", 20);
        b.item_group = ItemGroup::Medicine;
        let items = vec![a.clone(), b.clone()];

        assert_eq!(low_stock(&items).len(), 1);
        assert_eq!(filter_group(&items, ItemGroup::Medicine)[0].id, b.id);
    }

    #[test]
    fn test_issued_by_department() {
        let ts_2024 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap().timestamp_millis();
        let ts_2023 = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap().timestamp_millis();
        let log = |dept: &str, qty: i64, ts: i64, kind| Transaction {
            id: Uuid::new_v4().to_string(),
            item_id: "i".into(),
            item_name: "I".into(),
            spec: String::new(),
            unit: String::new(),
            kind,
            quantity: qty,
            person: String::new(),
            dept: dept.into(),
            reason: String::new(),
            timestamp: ts,
        };
        let logs = vec![
            log("南一隊", 3, ts_2024, TransactionType::Out),
            log("工安組", 5, ts_2024, TransactionType::Out),
            log("南一隊", 4, ts_2024, TransactionType::Out),
            log("南一隊", 100, ts_2023, TransactionType::Out),
            log("工安組", 50, ts_2024, TransactionType::In),
        ];

        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let ranking = issued_by_department(&logs, 2024, &tz);
        assert_eq!(ranking, vec![("南一隊".to_string(), 7), ("工安組".to_string(), 5)]);
    }
}
