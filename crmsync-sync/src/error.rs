//! Error types for the sync layer.

use crmsync_store::StoreError;
use crmsync_types::EntityKind;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Every variant aborts the current entity run. Failures of a single row
/// during batch application are not errors; they are collected as
/// [`RowFailure`](crate::mutator::RowFailure)s.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote rejected the access token. Recoverable once per page.
    #[error("access token invalid or expired")]
    AuthExpired,

    /// Any other non-2xx or malformed response from the remote API.
    #[error("remote API error (status {status}): {message}")]
    RemoteApi {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Transport failure or timeout talking to the remote.
    #[error("network error: {0}")]
    Network(String),

    /// The refresh-token exchange failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// No credentials have been stored yet.
    #[error("no credentials available")]
    MissingCredentials,

    /// The delete set is larger than the configured limit.
    #[error("refusing to delete {deletes} {entity} (limit {limit})")]
    GuardrailExceeded {
        entity: EntityKind,
        deletes: usize,
        limit: usize,
    },

    /// The store connection is gone; the batch cannot continue.
    #[error("store connection lost: {0}")]
    StoreConnection(#[source] StoreError),

    /// A store operation outside row-level application failed.
    #[error("storage error: {0}")]
    Store(#[source] StoreError),

    /// A record carries a field the entity schema has no column for.
    #[error("schema error: {0}")]
    Schema(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, SyncError::AuthExpired)
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        if err.is_connection_loss() {
            SyncError::StoreConnection(err)
        } else {
            SyncError::Store(err)
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Network(format!("request timed out: {err}"))
        } else {
            SyncError::Network(err.to_string())
        }
    }
}
