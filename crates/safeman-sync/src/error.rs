//! # Sync Error Types
//!
//! Error types for sync and commit operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Payload             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RequestFailed  │  │  MalformedSnapshot      │ │
//! │  │  InvalidUrl     │  │  HttpStatus     │  │  SerializationFailed    │ │
//! │  │  ConfigLoad/Save│  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Commit       │  │    Database     │  │      Domain             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  CommitInProg.  │  │  DatabaseError  │  │  Core(CoreError)        │ │
//! │  │  EmptyBasket    │  │  Io             │  │  (oversell, not found)  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport and payload errors never escape a commit; the processor turns
//! them into `SyncStatus::Error`. They do escape explicit `pull`/`push`
//! calls so callers can report them.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every sync and commit failure.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The HTTP request could not be completed.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The remote answered with a non-success status.
    #[error("Remote returned HTTP {0}")]
    HttpStatus(u16),

    /// Request timeout.
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// Remote (or file) body is not a snapshot.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Failed to serialize a snapshot.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Commit Errors
    // =========================================================================
    /// Another commit holds the in-progress guard. Nothing was changed.
    #[error("A commit is already in progress")]
    CommitInProgress,

    /// Commit called with nothing reserved. Nothing was changed.
    #[error("Basket is empty")]
    EmptyBasket,

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Ledger or basket rule violation.
    #[error(transparent)]
    Core(#[from] safeman_core::CoreError),

    /// Mirror database failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// File system failure (export/import).
    #[error("I/O error: {0}")]
    Io(String),

    /// Background task or channel failure.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<safeman_core::ValidationError> for SyncError {
    fn from(err: safeman_core::ValidationError) -> Self {
        SyncError::Core(err.into())
    }
}

impl From<safeman_db::DbError> for SyncError {
    fn from(err: safeman_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            SyncError::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            SyncError::MalformedSnapshot(err.to_string())
        } else {
            SyncError::RequestFailed(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// ## Retryable Errors
    /// - Request failures (network issues)
    /// - Timeouts
    /// - 5xx and 429 responses
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RequestFailed(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true for failures talking to, or understanding, the remote.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            SyncError::RequestFailed(_)
                | SyncError::HttpStatus(_)
                | SyncError::Timeout(_)
                | SyncError::MalformedSnapshot(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::RequestFailed("connection reset".into()).is_retryable());
        assert!(SyncError::Timeout(30).is_retryable());
        assert!(SyncError::HttpStatus(503).is_retryable());
        assert!(SyncError::HttpStatus(429).is_retryable());

        assert!(!SyncError::HttpStatus(404).is_retryable());
        assert!(!SyncError::MalformedSnapshot("no items".into()).is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::CommitInProgress.is_retryable());
    }

    #[test]
    fn test_categories() {
        assert!(SyncError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(SyncError::MalformedSnapshot("x".into()).is_transport_error());
        assert!(!SyncError::EmptyBasket.is_transport_error());
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: SyncError = safeman_core::CoreError::ItemNotFound("abc".into()).into();
        assert_eq!(err.to_string(), "Item not found: abc");
    }
}
