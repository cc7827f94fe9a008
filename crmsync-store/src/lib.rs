//! SQLite local store for crmsync.
//!
//! The sync core talks to the store through three narrow seams:
//!
//! - [`RecordStore`] hands out a [`StoreSession`], an exclusive scoped hold
//!   on the connection used for parameterized queries and statements.
//! - [`RunRecorder`] persists one [`RunMetrics`](crmsync_types::RunMetrics)
//!   row per completed run.
//! - [`CredentialStore`] loads and persists OAuth credentials.
//!
//! [`SqliteStore`] implements all three on a single `rusqlite` connection.
//! Entity tables are created by the caller (the sync crate owns the column
//! schemas); this crate only creates its own bookkeeping tables.

mod credentials;
mod error;
mod runs;
mod session;
mod sqlite;

pub use credentials::CredentialStore;
pub use error::{StoreError, StoreResult};
pub use runs::RunRecorder;
pub use session::{RecordStore, StoreSession};
pub use sqlite::{SqliteSession, SqliteStore};
