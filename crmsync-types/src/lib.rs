//! Core type definitions for crmsync.
//!
//! This crate defines the data model every other crate speaks:
//! - Scalar field values with the coerced comparison used by diffing
//! - Canonical records (flat field → scalar maps keyed by `id`)
//! - Field-level diffs addressed by `id`
//! - OAuth credentials and per-run metrics
//!
//! Nothing here performs I/O.

mod credentials;
mod entity;
mod ids;
mod record;
mod run;
mod value;

pub use credentials::Credentials;
pub use entity::EntityKind;
pub use ids::RunId;
pub use record::{CanonicalRecord, RecordDiff, RecordKey, ID_FIELD};
pub use run::RunMetrics;
pub use value::ScalarValue;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown entity kind: {0}")]
    UnknownEntity(String),

    #[error("record has no id")]
    MissingId,
}
