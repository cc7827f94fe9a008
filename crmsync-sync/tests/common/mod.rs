//! Test doubles shared by the sync integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use crmsync_sync::{Cursor, CredentialProvider, Page, PageFetcher, SyncError, SyncResult};
use crmsync_types::Credentials;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

// ── Page fetcher ────────────────────────────────────────────────

/// Serves a fixed list of pages, optionally failing some attempts.
///
/// Page `i` (0-based) advertises a next page token `t{i+1}` whenever a
/// later page exists. Cursors map back to page indexes: `Start` → 0,
/// `Token("tN")` → N, `Page(n)` → n - 1.
pub struct MockFetcher {
    pages: Vec<Vec<Value>>,
    endless: bool,
    failures: Mutex<HashMap<usize, Vec<SyncError>>>,
    calls: Mutex<Vec<(Cursor, String)>>,
}

impl MockFetcher {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            endless: false,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn single(records: Vec<Value>) -> Self {
        Self::new(vec![records])
    }

    /// Always advertises more records, even past the last page.
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Queues `error` for the next attempt at page `index`.
    pub fn fail_page(self, index: usize, error: SyncError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(index)
            .or_default()
            .push(error);
        self
    }

    pub fn calls(&self) -> Vec<(Cursor, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn index_of(cursor: &Cursor) -> usize {
        match cursor {
            Cursor::Start => 0,
            Cursor::Token(t) => t.trim_start_matches('t').parse().unwrap(),
            Cursor::Page(n) => (*n as usize) - 1,
        }
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_page(&self, cursor: &Cursor, access_token: &str) -> SyncResult<Page> {
        self.calls
            .lock()
            .unwrap()
            .push((cursor.clone(), access_token.to_string()));

        let index = Self::index_of(cursor);
        if let Some(queue) = self.failures.lock().unwrap().get_mut(&index) {
            if !queue.is_empty() {
                return Err(queue.remove(0));
            }
        }

        let records = self.pages.get(index).cloned().unwrap_or_default();
        let more = self.endless || index + 1 < self.pages.len();
        Ok(Page {
            records,
            more_records: more,
            next_page_token: more.then(|| format!("t{}", index + 1)),
        })
    }
}

// ── Credential provider ─────────────────────────────────────────

/// In-memory provider that mints `token-N` on each refresh.
pub struct StaticCredentials {
    current: Mutex<Option<Credentials>>,
    refreshes: Mutex<u32>,
    fail_refresh: bool,
}

impl StaticCredentials {
    pub fn new(access_token: &str) -> Self {
        Self {
            current: Mutex::new(Some(Credentials::new(access_token, "refresh"))),
            refreshes: Mutex::new(0),
            fail_refresh: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            current: Mutex::new(None),
            refreshes: Mutex::new(0),
            fail_refresh: false,
        }
    }

    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    pub fn refreshes(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> SyncResult<Option<Credentials>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh(&self, _rejected_access_token: &str) -> SyncResult<String> {
        if self.fail_refresh {
            return Err(SyncError::Auth("refresh rejected".to_string()));
        }
        let mut count = self.refreshes.lock().unwrap();
        *count += 1;
        let token = format!("token-{count}");
        let mut current = self.current.lock().unwrap();
        let creds = current.as_ref().ok_or(SyncError::MissingCredentials)?;
        *current = Some(creds.with_access_token(token.clone()));
        Ok(token)
    }
}
