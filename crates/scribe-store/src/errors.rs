//! Error types for the audit store.
//!
//! [`StoreError`] is the primary error type returned by all store operations.
//! The health gate classifies errors into connectivity failures (which degrade
//! health) and data errors (which do not) via [`StoreError::is_connectivity`].

use thiserror::Error;

/// Errors that can occur during audit store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Internal error (e.g. poisoned state).
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether this error indicates the database is unavailable rather than
    /// a problem with the specific statement.
    ///
    /// Pool check-out failures and `SQLITE_BUSY`/`SQLITE_LOCKED`/cannot-open
    /// conditions degrade the health gate; constraint violations and
    /// serialization failures do not.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
            ),
            _ => false,
        }
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
