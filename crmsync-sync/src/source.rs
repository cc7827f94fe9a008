//! Paginated fetch with cursor-preserving credential refresh.

use crate::credentials::CredentialProvider;
use crate::error::{SyncError, SyncResult};
use crate::schema::Pagination;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Position of the next page to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// First request of a token-paged or single-page collection.
    Start,
    Token(String),
    /// 1-based page number.
    Page(u32),
}

impl Cursor {
    pub fn initial(pagination: Pagination) -> Self {
        match pagination {
            Pagination::Token | Pagination::Single => Cursor::Start,
            Pagination::PageNumber => Cursor::Page(1),
        }
    }

    /// The cursor following `self`, or `None` when `page` was the last one.
    pub fn advance(&self, pagination: Pagination, page: &Page) -> Option<Cursor> {
        if !page.more_records {
            return None;
        }
        match pagination {
            Pagination::Single => None,
            Pagination::Token => page
                .next_page_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| Cursor::Token(t.to_string())),
            Pagination::PageNumber => match self {
                Cursor::Page(n) => Some(Cursor::Page(n + 1)),
                _ => Some(Cursor::Page(2)),
            },
        }
    }
}

/// One page of raw remote records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub more_records: bool,
    pub next_page_token: Option<String>,
}

/// Fetches a single page of a remote collection.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Requests the page at `cursor`. An invalid-token response must be
    /// reported as [`SyncError::AuthExpired`].
    async fn fetch_page(&self, cursor: &Cursor, access_token: &str) -> SyncResult<Page>;
}

/// Result of a full paginated fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub pages: u32,
    pub refreshes: u32,
    /// The page guard stopped the fetch while more records were advertised.
    pub truncated: bool,
}

/// Fetches every page of a collection, up to `max_pages`.
///
/// An [`SyncError::AuthExpired`] page is retried once with the same cursor
/// after a credential refresh. Any other error, or a second expiry on the
/// same page, aborts the whole fetch.
pub async fn fetch_all(
    credentials: &dyn CredentialProvider,
    fetcher: &dyn PageFetcher,
    pagination: Pagination,
    max_pages: u32,
) -> SyncResult<FetchOutcome> {
    let mut access_token = credentials
        .credentials()
        .await?
        .ok_or(SyncError::MissingCredentials)?
        .access_token;

    let mut outcome = FetchOutcome::default();
    let mut cursor = Cursor::initial(pagination);
    let mut refreshed_this_page = false;

    loop {
        if outcome.pages >= max_pages {
            warn!(
                "Page guard reached after {} pages; more records were advertised",
                outcome.pages
            );
            outcome.truncated = true;
            break;
        }

        let started = Instant::now();
        match fetcher.fetch_page(&cursor, &access_token).await {
            Ok(page) => {
                outcome.pages += 1;
                refreshed_this_page = false;
                debug!(
                    "Fetched page {} ({} records) in {}ms",
                    outcome.pages,
                    page.records.len(),
                    started.elapsed().as_millis()
                );
                let next = cursor.advance(pagination, &page);
                outcome.records.extend(page.records);
                match next {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
            Err(SyncError::AuthExpired) if !refreshed_this_page => {
                info!("Access token rejected on page {}; refreshing", outcome.pages + 1);
                access_token = credentials.refresh(&access_token).await?;
                refreshed_this_page = true;
                outcome.refreshes += 1;
            }
            Err(e) => {
                error!("Fetch failed on page {}: {}", outcome.pages + 1, e);
                return Err(e);
            }
        }
    }

    Ok(outcome)
}
