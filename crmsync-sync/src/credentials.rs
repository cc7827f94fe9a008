//! The credential seam shared by every pipeline.

use crate::error::SyncResult;
use async_trait::async_trait;
use crmsync_types::Credentials;

/// Supplies the current access token and refreshes it on demand.
///
/// One provider is shared by all pipelines of a process. Implementations
/// must serialize refreshes so that concurrent callers never overwrite a
/// fresher token with a staler one.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current credentials, or `None` when none have been stored.
    async fn credentials(&self) -> SyncResult<Option<Credentials>>;

    /// Replaces `rejected_access_token` with a new access token.
    ///
    /// If another caller already replaced it, the current token is returned
    /// without a second exchange.
    async fn refresh(&self, rejected_access_token: &str) -> SyncResult<String>;
}
