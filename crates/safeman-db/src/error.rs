//! # Mirror Error Types
//!
//! ```text
//! sqlx::Error / MigrateError / serde_json::Error
//!        │
//!        ▼
//!     DbError ──► LedgerStore degrades (load → empty, save → warn)
//!        │
//!        └──────► SyncError::DatabaseError everywhere else
//! ```

use thiserror::Error;

/// SQLite primary result codes that mean "another connection holds the lock".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Mirror operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The mirror file or its directory could not be opened or created.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another process held the write lock past the busy timeout.
    #[error("Mirror is busy: {0}")]
    Busy(String),

    /// A mirrored value could not be encoded or decoded.
    #[error("Corrupt mirror value for '{key}': {reason}")]
    CorruptValue { key: String, reason: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        DbError::CorruptValue {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Lock contention that may clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

fn is_lock_code(code: &str) -> bool {
    // Extended codes carry the primary code in the low byte.
    code.parse::<i32>()
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code() {
                    Some(code) if is_lock_code(&code) => DbError::Busy(message),
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
