use crate::error::StoreResult;
use crmsync_types::Credentials;

/// Persistence for the single set of OAuth credentials.
pub trait CredentialStore: Send + Sync {
    /// Loads the stored credentials, if any were ever saved.
    fn load_credentials(&self) -> StoreResult<Option<Credentials>>;

    /// Replaces both tokens.
    fn save_credentials(&self, credentials: &Credentials) -> StoreResult<()>;

    /// Replaces only the access token after a refresh.
    fn save_access_token(&self, access_token: &str) -> StoreResult<()>;
}
