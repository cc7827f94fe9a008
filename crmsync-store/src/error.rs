//! Error types for the store layer.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The connection is unusable (poisoned lock, failed open).
    #[error("connection error: {0}")]
    Connection(String),

    /// Stored data could not be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the error means the connection itself is gone or
    /// unusable, as opposed to a single statement being rejected.
    ///
    /// Batch application aborts on these and keeps going on everything else.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::OutOfMemory
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
                    | ErrorCode::FileLockingProtocolFailed
                    | ErrorCode::InternalMalfunction
            ),
            StoreError::Database(rusqlite::Error::InvalidPath(_)) => true,
            _ => false,
        }
    }
}
