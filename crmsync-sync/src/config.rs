//! Runtime configuration.

use crate::error::{SyncError, SyncResult};
use crate::schema::EntitySchema;
use chrono::FixedOffset;
use crmsync_types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL for the CRM REST API (e.g. `https://www.zohoapis.com`).
    pub api_base_url: String,
    /// Base URL for the OAuth accounts server (e.g. `https://accounts.zoho.com`).
    pub accounts_base_url: String,
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Scheme placed before the access token in the `Authorization` header.
    pub auth_scheme: String,
    /// Timeout applied to every HTTP request.
    pub request_timeout_secs: u64,
    /// Page size requested from paginated endpoints.
    pub per_page: u32,
    /// Offset (minutes east of UTC) zoned timestamps are converted to
    /// before being stored without a zone.
    pub timezone_offset_minutes: i32,
    /// Entity kinds a full sync runs, in order.
    pub entities: Vec<EntityKind>,
    /// Page-count guard overrides per entity kind.
    pub max_pages: BTreeMap<EntityKind, u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.zohoapis.com".to_string(),
            accounts_base_url: "https://accounts.zoho.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            auth_scheme: "Zoho-oauthtoken".to_string(),
            request_timeout_secs: 60,
            per_page: 200,
            timezone_offset_minutes: 0,
            entities: EntityKind::ALL.to_vec(),
            max_pages: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// Loads a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: SyncConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise fail deep inside a run.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api_base_url.is_empty() {
            return Err(SyncError::Config("api_base_url is empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config("request_timeout_secs must be positive".to_string()));
        }
        if self.per_page == 0 {
            return Err(SyncError::Config("per_page must be positive".to_string()));
        }
        if let Some((kind, _)) = self.max_pages.iter().find(|(_, pages)| **pages == 0) {
            return Err(SyncError::Config(format!("max_pages for {kind} must be positive")));
        }
        self.timezone()?;
        Ok(())
    }

    /// Page-count guard for a kind: the override, or the schema default.
    pub fn max_pages_for(&self, kind: EntityKind) -> u32 {
        self.max_pages
            .get(&kind)
            .copied()
            .unwrap_or_else(|| EntitySchema::for_kind(kind).max_pages)
    }

    pub fn timezone(&self) -> SyncResult<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset_minutes * 60).ok_or_else(|| {
            SyncError::Config(format!(
                "timezone_offset_minutes out of range: {}",
                self.timezone_offset_minutes
            ))
        })
    }

    /// OAuth token endpoint used for refresh-token exchanges.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/v2/token", self.accounts_base_url.trim_end_matches('/'))
    }
}
