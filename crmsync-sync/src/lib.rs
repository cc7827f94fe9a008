//! Pull-and-reconcile sync engine for CRM entity collections.
//!
//! Each entity kind (leads, users, roles) runs its own pipeline:
//!
//! 1. [`source::fetch_all`] pages through the remote collection, refreshing
//!    credentials once per page when the token is rejected.
//! 2. [`Normalizer`] projects remote and local rows onto the entity's
//!    [`EntitySchema`].
//! 3. [`reconcile`] sorts records into inserts, updates, and deletes.
//! 4. [`BatchMutator`] applies them row by row, behind a delete guardrail.
//! 5. The run's [`RunMetrics`](crmsync_types::RunMetrics) are recorded.
//!
//! [`SyncPipeline`] drives one run through these phases as a state machine;
//! [`SyncOrchestrator`] runs several pipelines sequentially or concurrently.

pub mod config;
pub mod credentials;
pub mod error;
pub mod mutator;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod schema;
pub mod source;

pub use config::SyncConfig;
pub use credentials::CredentialProvider;
pub use error::{SyncError, SyncResult};
pub use mutator::{
    check_guardrail, BatchMutator, BatchOutcome, MutationKind, RowFailure, MAX_DELETES,
};
pub use normalize::Normalizer;
pub use orchestrator::{EntityRun, RunMode, SyncOrchestrator};
pub use pipeline::{PipelineError, RunPhase, RunReport, SyncPipeline};
pub use reconcile::{diff_records, reconcile, ReconciliationResult};
pub use remote::{CrmClient, EntityFetcher, OAuthCredentialProvider};
pub use schema::{Column, ColumnType, EntitySchema, Pagination};
pub use source::{fetch_all, Cursor, FetchOutcome, Page, PageFetcher};
