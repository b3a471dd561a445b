//! Storage error types for chill-storage.
//!
//! [`StorageError::ReadOnly`] is kept apart from generic database failures:
//! both the store's own read-only flag and SQLite's `SQLITE_READONLY` land
//! there, so callers can answer a write against a read-only site precisely.

use chill_core::{Method, NodeId, SqlIntent};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying SQLite call failed.
    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// The database is not in write-ahead-log mode.
    #[error("journal mode is '{found}', expected 'wal'")]
    JournalMode { found: String },

    /// A write was attempted against a read-only store.
    #[error("store is read-only")]
    ReadOnly,

    /// A node with the given ID was not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// No query file with this name exists in the theme or the bundle.
    #[error("query not found: {0}")]
    QueryNotFound(String),

    /// A statement's intent is not permitted for the request verb.
    #[error("{method} may not run a {intent} statement")]
    IntentMismatch { method: Method, intent: SqlIntent },

    /// Reading a query file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be interpreted.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ReadOnly) => StorageError::ReadOnly,
            _ => StorageError::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_readonly_maps_to_read_only() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            None,
        );
        assert!(matches!(StorageError::from(err), StorageError::ReadOnly));
    }

    #[test]
    fn other_sqlite_errors_stay_generic() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(StorageError::from(err), StorageError::Sqlite(_)));
    }

    #[test]
    fn intent_mismatch_message() {
        let err = StorageError::IntentMismatch {
            method: Method::Get,
            intent: SqlIntent::Insert,
        };
        assert_eq!(err.to_string(), "GET may not run a INSERT statement");
    }
}
