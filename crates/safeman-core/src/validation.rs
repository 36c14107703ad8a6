//! # Validation Module
//!
//! Input checks run before an operation touches the basket or the ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI / UI                                                     │
//! │  └── Argument parsing (clap), numeric types                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Item drafts (name, counts, dates)                                 │
//! │  └── Issuance metadata (department)                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Basket                                                       │
//! │  └── Positive quantity, known item, OUT oversell                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use safeman_core::types::ItemDraft;
//! use safeman_core::validation::validate_draft;
//!
//! let mut draft = ItemDraft::new("Burn gel", "tube");
//! draft.expiry_date = Some("2026-03-31".to_string());
//! assert!(validate_draft(&draft).is_ok());
//!
//! draft.expiry_date = Some("31/03/2026".to_string());
//! assert!(validate_draft(&draft).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::ItemDraft;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted item name.
pub const MAX_NAME_LEN: usize = 200;

/// Validates an item name.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_LEN`] characters
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a count that may be zero but not negative.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an optional `YYYY-MM-DD` calendar date. Blank counts as absent.
pub fn validate_date(field: &str, value: Option<&str>) -> ValidationResult<()> {
    match value.map(str::trim) {
        None | Some("") => Ok(()),
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Validates every field of an item draft.
pub fn validate_draft(draft: &ItemDraft) -> ValidationResult<()> {
    validate_item_name(&draft.name)?;
    validate_non_negative("quantity", draft.quantity)?;
    validate_non_negative("minStock", draft.min_stock)?;
    validate_date("purchaseDate", draft.purchase_date.as_deref())?;
    validate_date("expiryDate", draft.expiry_date.as_deref())?;
    Ok(())
}

/// Validates the department of an issuance (OUT) commit.
pub fn validate_dept(dept: &str) -> ValidationResult<()> {
    if dept.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "dept".to_string(),
        });
    }
    Ok(())
}
