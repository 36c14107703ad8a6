//! # Domain Types
//!
//! Wire types exchanged between replicas and the remote snapshot store.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │                    ┌──────────────────────────┐                         │
//! │                    │        Snapshot          │                         │
//! │                    │  ──────────────────────  │                         │
//! │                    │  items: Vec<Item>        │                         │
//! │                    │  logs:  Vec<Transaction> │                         │
//! │                    │  timestamp (epoch ms)    │                         │
//! │                    └─────┬──────────────┬─────┘                         │
//! │                          │              │                               │
//! │  ┌───────────────────────▼──┐   ┌───────▼──────────────────┐           │
//! │  │          Item            │   │       Transaction        │           │
//! │  │  ──────────────────────  │   │  ──────────────────────  │           │
//! │  │  id (immutable)          │   │  id (UUID)               │           │
//! │  │  name / unit / spec      │   │  itemId / itemName /spec │  ← frozen │
//! │  │  itemType / itemGroup    │   │  type IN | OUT           │           │
//! │  │  quantity ≥ 0            │   │  quantity > 0            │           │
//! │  │  minStock                │   │  person / dept / reason  │           │
//! │  └──────────────────────────┘   └──────────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Compatibility
//! Field names are camelCase and enum values match what existing replicas
//! already store remotely. Fields added later (`spec`/`unit` on log
//! entries, `description`) default to empty so older snapshots still parse.
//! Timestamps are epoch milliseconds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;
use uuid::Uuid;

// =============================================================================
// Category
// =============================================================================

/// Display category of an item.
///
/// Serialized as its display label. Labels this build doesn't know decode
/// to [`Category::Other`] so one odd item never poisons a whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Protection,
    FireSafety,
    FirstAid,
    Signage,
    Tool,
    #[default]
    Other,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Protection,
        Category::FireSafety,
        Category::FirstAid,
        Category::Signage,
        Category::Tool,
        Category::Other,
    ];

    /// The label stored on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Protection => "個人防護 (PPE)",
            Category::FireSafety => "消防安全",
            Category::FirstAid => "急救耗材",
            Category::Signage => "標誌警告",
            Category::Tool => "工具設備",
            Category::Other => "其他",
        }
    }

    /// Maps a wire label back to a category, falling back to `Other`.
    pub fn from_label(label: &str) -> Self {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or(Category::Other)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Category::from_label(&label))
    }
}

// =============================================================================
// Item Type / Item Group
// =============================================================================

/// Whether an item is durable equipment or a consumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Equipment,
    #[default]
    Consumable,
}

/// Which inventory list an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemGroup {
    /// Safety supplies and equipment.
    #[default]
    Inventory,
    /// Medical supplies; the only group that tracks purchase/expiry dates.
    Medicine,
}

impl std::str::FromStr for ItemGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inventory" => Ok(ItemGroup::Inventory),
            "medicine" => Ok(ItemGroup::Medicine),
            other => Err(format!(
                "unknown item group '{}', expected inventory or medicine",
                other
            )),
        }
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Restock: quantity is added.
    In,
    /// Issuance: quantity is removed, clamped at zero.
    Out,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::In => write!(f, "IN"),
            TransactionType::Out => write!(f, "OUT"),
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// A stocked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier, immutable after creation.
    pub id: String,

    pub name: String,

    #[serde(default)]
    #[ts(as = "String")]
    pub category: Category,

    #[serde(default)]
    pub item_type: ItemType,

    #[serde(default)]
    pub item_group: ItemGroup,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub spec: String,

    /// Current on-hand count. Never negative; a negative wire value
    /// decodes as 0.
    #[serde(deserialize_with = "clamp_non_negative")]
    pub quantity: i64,

    /// Reorder threshold, advisory only.
    #[serde(default, deserialize_with = "clamp_non_negative")]
    pub min_stock: i64,

    /// `YYYY-MM-DD`, MEDICINE only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,

    /// `YYYY-MM-DD`, MEDICINE only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Epoch milliseconds of the last mutation.
    #[serde(default)]
    pub last_updated: i64,
}

impl Item {
    /// Creates a new item with a fresh UUID from a validated draft.
    pub fn from_draft(draft: ItemDraft, now_ms: i64) -> Self {
        let mut item = Item {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            category: Category::Other,
            item_type: ItemType::default(),
            item_group: ItemGroup::default(),
            unit: String::new(),
            spec: String::new(),
            quantity: 0,
            min_stock: 0,
            purchase_date: None,
            expiry_date: None,
            description: String::new(),
            last_updated: now_ms,
        };
        item.merge_draft(draft, now_ms);
        item
    }

    /// Overwrites every editable field with the draft's, keeping `id`.
    pub fn merge_draft(&mut self, draft: ItemDraft, now_ms: i64) {
        self.name = draft.name;
        self.category = draft.category;
        self.item_type = draft.item_type;
        self.item_group = draft.item_group;
        self.unit = draft.unit;
        self.spec = draft.spec;
        self.quantity = draft.quantity.max(0);
        self.min_stock = draft.min_stock.max(0);
        self.purchase_date = draft.purchase_date;
        self.expiry_date = draft.expiry_date;
        self.description = draft.description;
        self.last_updated = now_ms;
    }

    /// True when on-hand quantity has fallen to the reorder threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

// =============================================================================
// Item Draft
// =============================================================================

/// Editable fields of an item, as entered by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub item_group: ItemGroup,
    pub unit: String,
    #[serde(default)]
    pub spec: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl ItemDraft {
    /// Creates a draft with just a name and unit; everything else defaulted.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        ItemDraft {
            name: name.into(),
            category: Category::Other,
            item_type: ItemType::default(),
            item_group: ItemGroup::default(),
            unit: unit.into(),
            spec: String::new(),
            quantity: 0,
            min_stock: 0,
            purchase_date: None,
            expiry_date: None,
            description: String::new(),
        }
    }

    /// Starts a draft from an existing item, for partial edits.
    pub fn from_item(item: &Item) -> Self {
        ItemDraft {
            name: item.name.clone(),
            category: item.category,
            item_type: item.item_type,
            item_group: item.item_group,
            unit: item.unit.clone(),
            spec: item.spec.clone(),
            quantity: item.quantity,
            min_stock: item.min_stock,
            purchase_date: item.purchase_date.clone(),
            expiry_date: item.expiry_date.clone(),
            description: item.description.clone(),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Immutable record of one item movement.
///
/// `item_name`, `spec` and `unit` are frozen copies taken at commit time, so
/// history still reads correctly after the item is edited or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub item_id: String,
    pub item_name: String,
    #[serde(default)]
    pub spec: String,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    pub person: String,
    pub dept: String,
    #[serde(default)]
    pub reason: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

// =============================================================================
// Snapshot
// =============================================================================

/// The full document exchanged wholesale with the remote store.
///
/// `items` is mandatory: a payload without it is malformed. A missing or
/// `null` `logs` reads as an empty log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Snapshot {
    pub items: Vec<Item>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<Transaction>,

    /// Epoch milliseconds when the snapshot was produced.
    #[serde(default)]
    pub timestamp: i64,
}

impl Snapshot {
    /// A snapshot with no items and no history.
    pub fn empty() -> Self {
        Snapshot {
            items: Vec::new(),
            logs: Vec::new(),
            timestamp: 0,
        }
    }

    /// Looks up an item by id.
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Parses a snapshot from a JSON document.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// True when the two snapshots hold the same items and logs, ignoring
    /// the embedded timestamp.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.items == other.items && self.logs == other.logs
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::empty()
    }
}

fn clamp_non_negative<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(i64::deserialize(deserializer)?.max(0))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Issuance Batch
// =============================================================================

/// Finalized record of one commit, handed to slip renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceBatch {
    pub id: String,
    pub mode: TransactionType,
    pub dept: String,
    pub person: String,
    pub reason: String,
    pub entries: Vec<crate::basket::BasketEntry>,
    pub timestamp: i64,
    /// Log entries prepended by this commit, in basket order.
    pub transactions: Vec<Transaction>,
    /// Basket item ids absent from the basis snapshot at commit time.
    pub missing_items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wire_format_is_camel_case() {
        let mut item = Item::from_draft(ItemDraft::new("Helmet", "pc"), 42);
        item.item_type = ItemType::Equipment;
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["itemType"], "EQUIPMENT");
        assert_eq!(json["itemGroup"], "INVENTORY");
        assert_eq!(json["minStock"], 0);
        assert_eq!(json["lastUpdated"], 42);
        assert_eq!(json["category"], "其他");
        assert!(json.get("purchaseDate").is_none());
    }

    #[test]
    fn test_unknown_category_decodes_as_other() {
        let json = r#"{"id":"a","name":"Gloves","category":"新分類","quantity":3}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.category, Category::Other);
        assert_eq!(item.min_stock, 0);
        assert_eq!(item.description, "");
    }

    #[test]
    fn test_negative_counts_decode_as_zero() {
        let body = r#"{"items":[{"id":"a","name":"Gloves","quantity":-4,"minStock":-1}],"logs":[]}"#;
        let snapshot = Snapshot::from_json(body).unwrap();
        assert_eq!(snapshot.items[0].quantity, 0);
        assert_eq!(snapshot.items[0].min_stock, 0);

        let item: Item = serde_json::from_str(r#"{"id":"b","name":"Mask","quantity":7}"#).unwrap();
        assert_eq!(item.quantity, 7);
    }

    #[test]
    fn test_known_category_round_trips_label() {
        let json = r#"{"id":"a","name":"Extinguisher","category":"消防安全","quantity":1}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.category, Category::FireSafety);
        assert_eq!(serde_json::to_value(item.category).unwrap(), "消防安全");
    }

    #[test]
    fn test_transaction_type_field_is_named_type() {
        let json = r#"{
            "id":"t1","itemId":"a","itemName":"Gloves","type":"OUT",
            "quantity":2,"person":"Lin","dept":"工安組","reason":"","timestamp":5
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionType::Out);
        assert_eq!(tx.spec, "");

        let back = serde_json::to_value(&tx).unwrap();
        assert_eq!(back["type"], "OUT");
    }

    #[test]
    fn test_snapshot_requires_items() {
        assert!(Snapshot::from_json(r#"{"logs":[],"timestamp":1}"#).is_err());
        assert!(Snapshot::from_json(r#"{"items":null}"#).is_err());
        assert!(Snapshot::from_json("not json").is_err());
    }

    #[test]
    fn test_snapshot_logs_default_to_empty() {
        let snap = Snapshot::from_json(r#"{"items":[],"logs":null}"#).unwrap();
        assert!(snap.logs.is_empty());
        assert_eq!(snap.timestamp, 0);

        let snap = Snapshot::from_json(r#"{"items":[]}"#).unwrap();
        assert!(snap.logs.is_empty());
    }

    #[test]
    fn test_low_stock_threshold_is_inclusive() {
        let mut item = Item::from_draft(ItemDraft::new("Bandage", "roll"), 0);
        item.min_stock = 5;
        item.quantity = 5;
        assert!(item.is_low_stock());
        item.quantity = 6;
        assert!(!item.is_low_stock());
    }

    #[test]
    fn test_merge_draft_keeps_id() {
        let mut item = Item::from_draft(ItemDraft::new("Bandage", "roll"), 0);
        let id = item.id.clone();
        let mut draft = ItemDraft::from_item(&item);
        draft.name = "Elastic Bandage".to_string();
        draft.quantity = -3;
        item.merge_draft(draft, 99);

        assert_eq!(item.id, id);
        assert_eq!(item.name, "Elastic Bandage");
        assert_eq!(item.quantity, 0);
        assert_eq!(item.last_updated, 99);
    }

    #[test]
    fn test_item_group_parsing() {
        assert_eq!("medicine".parse::<ItemGroup>().unwrap(), ItemGroup::Medicine);
        assert_eq!("INVENTORY".parse::<ItemGroup>().unwrap(), ItemGroup::Inventory);
        assert!("tools".parse::<ItemGroup>().is_err());
    }
}
