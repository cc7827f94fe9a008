use crate::credentials::CredentialStore;
use crate::error::StoreResult;
use crate::runs::RunRecorder;
use crmsync_types::{CanonicalRecord, ScalarValue};

/// Parameterized statement execution against the local store.
///
/// Placeholders are positional (`?1`, `?2`, …) and bound from `params`
/// in order.
pub trait StoreSession {
    /// Runs a query and returns every row as a record keyed by column name.
    fn query(&self, sql: &str, params: &[ScalarValue]) -> StoreResult<Vec<CanonicalRecord>>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&self, sql: &str, params: &[ScalarValue]) -> StoreResult<usize>;

    /// Runs one or more parameterless statements (DDL).
    fn execute_batch(&self, sql: &str) -> StoreResult<()>;
}

/// A local store a pipeline can hold for the length of a run.
///
/// The session is a scoped acquisition: whatever it holds is released
/// when it is dropped, on success and on every error path alike.
pub trait RecordStore: CredentialStore + Send + Sync {
    type Session<'a>: StoreSession + RunRecorder
    where
        Self: 'a;

    fn session(&self) -> StoreResult<Self::Session<'_>>;
}
