//! OAuth refresh-token credential provider.

use crate::config::SyncConfig;
use crate::credentials::CredentialProvider;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use crmsync_store::CredentialStore;
use crmsync_types::Credentials;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    #[allow(dead_code)]
    expires_in: Option<u64>,
}

/// Credentials loaded from a [`CredentialStore`] and refreshed against the
/// OAuth token endpoint.
///
/// Reads go through a cached copy behind an `RwLock`. Refreshes are
/// serialized by a separate mutex and coalesced on the rejected token.
pub struct OAuthCredentialProvider {
    store: Arc<dyn CredentialStore>,
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: RwLock<Option<Credentials>>,
    refresh_lock: Mutex<()>,
}

impl OAuthCredentialProvider {
    pub fn new(config: &SyncConfig, store: Arc<dyn CredentialStore>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            store,
            client,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    async fn exchange(&self, refresh_token: &str) -> SyncResult<String> {
        debug!("Exchanging refresh token at {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!("token refresh failed ({status}): {error}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("failed to parse token response: {e}")))?;

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => Err(SyncError::Auth(format!(
                "token response carried no access_token: {}",
                token.error.unwrap_or_else(|| "unknown error".to_string())
            ))),
        }
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    async fn credentials(&self) -> SyncResult<Option<Credentials>> {
        if let Some(creds) = self.cached.read().await.as_ref() {
            return Ok(Some(creds.clone()));
        }

        let loaded = self.store.load_credentials()?;
        let mut cached = self.cached.write().await;
        if cached.is_none() {
            *cached = loaded;
        }
        Ok(cached.clone())
    }

    async fn refresh(&self, rejected_access_token: &str) -> SyncResult<String> {
        let _guard = self.refresh_lock.lock().await;

        let current = self
            .credentials()
            .await?
            .ok_or(SyncError::MissingCredentials)?;
        if current.access_token != rejected_access_token {
            debug!("Access token already refreshed by another pipeline");
            return Ok(current.access_token);
        }

        let access_token = self.exchange(&current.refresh_token).await?;
        self.store.save_access_token(&access_token)?;
        *self.cached.write().await = Some(current.with_access_token(access_token.clone()));

        info!("Access token refreshed");
        Ok(access_token)
    }
}
