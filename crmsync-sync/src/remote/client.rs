//! HTTP client for the CRM REST API.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::schema::{EntitySchema, Pagination};
use crate::source::{Cursor, Page, PageFetcher};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Error code the API returns for an invalid or expired access token.
pub const INVALID_TOKEN_CODE: &str = "INVALID_TOKEN";

#[derive(Debug, Default, Deserialize)]
struct PageInfo {
    #[serde(default)]
    more_records: bool,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

/// CRM API client. Cheap to share; one instance serves every pipeline.
pub struct CrmClient {
    client: Client,
    api_base_url: String,
    auth_scheme: String,
    per_page: u32,
}

impl CrmClient {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_scheme: config.auth_scheme.clone(),
            per_page: config.per_page,
        })
    }

    /// A page fetcher for one entity collection.
    pub fn fetcher(&self, schema: &'static EntitySchema) -> EntityFetcher<'_> {
        EntityFetcher {
            client: self,
            schema,
        }
    }

    fn query_for(&self, schema: &EntitySchema, cursor: &Cursor) -> Vec<(&'static str, String)> {
        let mut query: Vec<(&'static str, String)> = schema
            .query
            .iter()
            .map(|(k, v)| (*k, (*v).to_string()))
            .collect();

        if schema.project_fields {
            query.push(("fields", schema.remote_fields()));
        }
        match cursor {
            Cursor::Start => {}
            Cursor::Token(token) => query.push(("page_token", token.clone())),
            Cursor::Page(page) => query.push(("page", page.to_string())),
        }
        if schema.pagination != Pagination::Single {
            query.push(("per_page", self.per_page.to_string()));
        }
        query
    }

    async fn get_page(
        &self,
        schema: &EntitySchema,
        cursor: &Cursor,
        access_token: &str,
    ) -> SyncResult<Page> {
        let url = format!("{}{}", self.api_base_url, schema.endpoint);
        debug!("GET {} ({:?})", url, cursor);

        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", self.auth_scheme, access_token),
            )
            .query(&self.query_for(schema, cursor))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Page::default());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let mut body: Value = response.json().await.map_err(|e| SyncError::RemoteApi {
            status: status.as_u16(),
            code: None,
            message: format!("failed to parse {} response: {e}", schema.kind),
        })?;

        let records = match body.get_mut(schema.records_key).map(Value::take) {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(SyncError::RemoteApi {
                    status: status.as_u16(),
                    code: None,
                    message: format!("response has no '{}' array", schema.records_key),
                });
            }
        };

        // A paginated page without a readable `info` cannot say whether it
        // is the last one; treating it as final would truncate the source.
        let info: PageInfo = match body.get_mut("info").map(Value::take) {
            Some(info) => serde_json::from_value(info).map_err(|e| SyncError::RemoteApi {
                status: status.as_u16(),
                code: None,
                message: format!("malformed page info in {} response: {e}", schema.kind),
            })?,
            None if schema.pagination == Pagination::Single => PageInfo::default(),
            None => {
                return Err(SyncError::RemoteApi {
                    status: status.as_u16(),
                    code: None,
                    message: format!("{} response has no page info", schema.kind),
                });
            }
        };

        Ok(Page {
            records,
            more_records: info.more_records,
            next_page_token: info.next_page_token,
        })
    }
}

fn classify_error(status: StatusCode, body: &str) -> SyncError {
    let parsed: Option<ApiError> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(err) => (err.code, err.message.unwrap_or_else(|| body.to_string())),
        None => (None, body.to_string()),
    };

    if code.as_deref() == Some(INVALID_TOKEN_CODE) {
        return SyncError::AuthExpired;
    }
    SyncError::RemoteApi {
        status: status.as_u16(),
        code,
        message,
    }
}

/// [`PageFetcher`] bound to one entity collection.
pub struct EntityFetcher<'a> {
    client: &'a CrmClient,
    schema: &'static EntitySchema,
}

impl EntityFetcher<'_> {
    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }
}

#[async_trait]
impl PageFetcher for EntityFetcher<'_> {
    async fn fetch_page(&self, cursor: &Cursor, access_token: &str) -> SyncResult<Page> {
        self.client.get_page(self.schema, cursor, access_token).await
    }
}
