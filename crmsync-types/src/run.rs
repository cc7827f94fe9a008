//! Metrics persisted once per completed run.

use crate::{EntityKind, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one completed pipeline run. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_id: RunId,
    pub entity: EntityKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub insert_count: usize,
    pub update_count: usize,
    pub delete_count: usize,
    /// Rows that failed to apply individually during the run.
    pub failed_rows: usize,
}

impl RunMetrics {
    /// Total number of mutations the run attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.insert_count + self.update_count + self.delete_count
    }
}
