use crate::error::StoreResult;
use crmsync_types::RunMetrics;

/// Sink for per-run metrics rows.
pub trait RunRecorder {
    fn record_run(&self, metrics: &RunMetrics) -> StoreResult<()>;
}
