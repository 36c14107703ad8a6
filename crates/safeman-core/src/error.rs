//! # Error Types
//!
//! Domain-specific error types for safeman-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  safeman-core errors (this file)                                       │
//! │  ├── CoreError        - Basket and ledger rule violations              │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  safeman-db errors (separate crate)                                    │
//! │  └── DbError          - Mirror read/write failures                     │
//! │                                                                         │
//! │  safeman-sync errors (separate crate)                                  │
//! │  └── SyncError        - Transport, payload and commit failures         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → CLI                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error in this file is raised synchronously, before any network
//! round-trip happens.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger and basket rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item id is not present in the snapshot being used.
    ///
    /// ## When This Occurs
    /// - Reserving an id the local replica doesn't know
    /// - Editing or deleting an item another client already deleted
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// OUT reservation would exceed the unreserved on-hand quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Item X: quantity 10, basket already holds 4
    ///      │
    ///      ▼
    /// reserve(X, 7) → available = 10 - 4 = 6
    ///      │
    ///      ▼
    /// InsufficientStock { item_id: "X", available: 6, requested: 7 }
    /// ```
    #[error("Insufficient stock for {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: String,
        available: i64,
        requested: i64,
    },

    /// Basket entry index is out of bounds.
    #[error("No basket entry at index {index} (basket has {len} entries)")]
    InvalidBasketIndex { index: usize, len: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value would push a count past what it can hold.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: i64 },

    /// Invalid format (e.g., a date that isn't YYYY-MM-DD).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            item_id: "mask-n95".to_string(),
            available: 6,
            requested: 7,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for mask-n95: available 6, requested 7"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: name is required");
    }
}
