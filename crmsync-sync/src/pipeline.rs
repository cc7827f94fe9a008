//! One entity run as an explicit state machine.
//!
//! ```text
//! FETCH_SOURCE → FETCH_TARGET → RECONCILE → APPLY_INSERTS → APPLY_UPDATES
//!     → APPLY_DELETES → RECORD_METRICS → DONE
//! ```
//!
//! Any step may instead move to `FAILED`, which is terminal and skips
//! `RECORD_METRICS`. Row-level failures do not fail a run.

use crate::config::SyncConfig;
use crate::credentials::CredentialProvider;
use crate::error::{SyncError, SyncResult};
use crate::mutator::{check_guardrail, BatchMutator, RowFailure};
use crate::normalize::Normalizer;
use crate::reconcile::{reconcile, ReconciliationResult};
use crate::schema::EntitySchema;
use crate::source::{fetch_all, FetchOutcome, PageFetcher};
use chrono::{DateTime, Utc};
use crmsync_store::{RecordStore, RunRecorder, StoreSession};
use crmsync_types::{CanonicalRecord, EntityKind, RunId, RunMetrics};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Phase of an entity run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    FetchSource,
    FetchTarget,
    Reconcile,
    ApplyInserts,
    ApplyUpdates,
    ApplyDeletes,
    RecordMetrics,
    Done,
    Failed,
}

impl RunPhase {
    /// The phase a successful step moves to. Terminal phases have none.
    pub fn next(self) -> Option<RunPhase> {
        use RunPhase::*;
        match self {
            FetchSource => Some(FetchTarget),
            FetchTarget => Some(Reconcile),
            Reconcile => Some(ApplyInserts),
            ApplyInserts => Some(ApplyUpdates),
            ApplyUpdates => Some(ApplyDeletes),
            ApplyDeletes => Some(RecordMetrics),
            RecordMetrics => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::FetchSource => "FETCH_SOURCE",
            RunPhase::FetchTarget => "FETCH_TARGET",
            RunPhase::Reconcile => "RECONCILE",
            RunPhase::ApplyInserts => "APPLY_INSERTS",
            RunPhase::ApplyUpdates => "APPLY_UPDATES",
            RunPhase::ApplyDeletes => "APPLY_DELETES",
            RunPhase::RecordMetrics => "RECORD_METRICS",
            RunPhase::Done => "DONE",
            RunPhase::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that ended in `FAILED`.
#[derive(Debug, Error)]
#[error("{entity} run failed during {phase}: {source}")]
pub struct PipelineError {
    pub entity: EntityKind,
    /// The phase that was executing when the run failed.
    pub phase: RunPhase,
    #[source]
    pub source: SyncError,
}

/// Result of a run that reached `DONE`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub metrics: RunMetrics,
    pub pages: u32,
    pub refreshes: u32,
    /// The page guard cut the source fetch short.
    pub truncated: bool,
    pub failures: Vec<RowFailure>,
    /// Whether the metrics row was persisted.
    pub recorded: bool,
}

/// Tracks the current phase and logs transitions.
struct PhaseTracker {
    entity: EntityKind,
    phase: RunPhase,
}

impl PhaseTracker {
    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            debug!("{}: {} -> {}", self.entity, self.phase, next);
            self.phase = next;
        }
    }
}

/// The fetch → reconcile → apply → record pipeline for one entity kind.
pub struct SyncPipeline<'a, S: RecordStore> {
    schema: &'static EntitySchema,
    store: &'a S,
    credentials: &'a dyn CredentialProvider,
    fetcher: &'a dyn PageFetcher,
    normalizer: Normalizer,
    max_pages: u32,
}

impl<'a, S: RecordStore> SyncPipeline<'a, S> {
    /// Builds a pipeline with the schema's default page guard.
    pub fn new(
        schema: &'static EntitySchema,
        store: &'a S,
        credentials: &'a dyn CredentialProvider,
        fetcher: &'a dyn PageFetcher,
    ) -> Self {
        Self {
            schema,
            store,
            credentials,
            fetcher,
            normalizer: Normalizer::utc(),
            max_pages: schema.max_pages,
        }
    }

    /// Builds a pipeline with limits and time zone taken from `config`.
    pub fn from_config(
        config: &SyncConfig,
        kind: EntityKind,
        store: &'a S,
        credentials: &'a dyn CredentialProvider,
        fetcher: &'a dyn PageFetcher,
    ) -> SyncResult<Self> {
        Ok(Self::new(EntitySchema::for_kind(kind), store, credentials, fetcher)
            .with_normalizer(Normalizer::new(config.timezone()?))
            .with_max_pages(config.max_pages_for(kind)))
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.schema.kind
    }

    /// Runs the pipeline to `DONE` or `FAILED`.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut tracker = PhaseTracker {
            entity: self.schema.kind,
            phase: RunPhase::FetchSource,
        };
        info!("Starting {} sync (run {})", self.schema.kind, run_id);

        let result = match self.fetch_source().await {
            Ok(fetched) => {
                tracker.advance();
                self.reconcile_and_apply(&mut tracker, fetched, run_id, started_at, clock)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                tracker.advance();
                info!(
                    "Finished {} sync in {}ms: {} inserted, {} updated, {} deleted, {} failed rows",
                    self.schema.kind,
                    report.metrics.duration_ms,
                    report.metrics.insert_count,
                    report.metrics.update_count,
                    report.metrics.delete_count,
                    report.metrics.failed_rows
                );
                Ok(report)
            }
            Err(source) => {
                let phase = tracker.phase;
                error!(
                    "{} sync failed during {} after {}ms: {}",
                    self.schema.kind,
                    phase,
                    clock.elapsed().as_millis(),
                    source
                );
                Err(PipelineError {
                    entity: self.schema.kind,
                    phase,
                    source,
                })
            }
        }
    }

    /// Fetches the raw remote collection without touching the store.
    pub async fn fetch_source(&self) -> SyncResult<FetchOutcome> {
        let outcome = fetch_all(
            self.credentials,
            self.fetcher,
            self.schema.pagination,
            self.max_pages,
        )
        .await?;
        if outcome.truncated {
            warn!(
                "{} source fetch stopped at the {}-page guard; result may be incomplete",
                self.schema.kind, self.max_pages
            );
        }
        info!(
            "Fetched {} {} source records in {} pages",
            outcome.records.len(),
            self.schema.kind,
            outcome.pages
        );
        Ok(outcome)
    }

    /// FETCH_TARGET through RECORD_METRICS, holding one store session.
    fn reconcile_and_apply(
        &self,
        tracker: &mut PhaseTracker,
        fetched: FetchOutcome,
        run_id: RunId,
        started_at: DateTime<Utc>,
        clock: Instant,
    ) -> SyncResult<RunReport> {
        let source = self.normalizer.normalize_source(&fetched.records, self.schema);

        let session = self.store.session()?;
        let target = self.load_target(&session)?;
        tracker.advance();

        let plan = reconcile(&source, &target);
        self.log_plan(&plan, source.len(), target.len());
        check_guardrail(self.schema.kind, plan.deletes.len())?;
        tracker.advance();

        let mutator = BatchMutator::new(&session, self.schema);
        let inserts = mutator.apply_inserts(&plan.inserts)?;
        tracker.advance();
        let updates = mutator.apply_updates(&plan.updates)?;
        tracker.advance();
        let deletes = mutator.apply_soft_deletes(&plan.deletes)?;
        tracker.advance();

        let mut failures = inserts.failures;
        failures.extend(updates.failures);
        failures.extend(deletes.failures);

        let metrics = RunMetrics {
            run_id,
            entity: self.schema.kind,
            started_at,
            duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            insert_count: inserts.applied,
            update_count: updates.applied,
            delete_count: deletes.applied,
            failed_rows: failures.len(),
        };

        let recorded = match session.record_run(&metrics) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to record {} run metrics: {}", self.schema.kind, e);
                false
            }
        };

        Ok(RunReport {
            metrics,
            pages: fetched.pages,
            refreshes: fetched.refreshes,
            truncated: fetched.truncated,
            failures,
            recorded,
        })
    }

    fn load_target<T: StoreSession>(&self, session: &T) -> SyncResult<Vec<CanonicalRecord>> {
        self.schema.ensure_table(session)?;
        let rows = session.query(&self.schema.select_live_sql(), &[])?;
        Ok(self.normalizer.normalize_target(rows, self.schema))
    }

    fn log_plan(&self, plan: &ReconciliationResult, source: usize, target: usize) {
        info!(
            "{}: {} source, {} target -> {} to insert, {} to update, {} to delete",
            self.schema.kind,
            source,
            target,
            plan.inserts.len(),
            plan.updates.len(),
            plan.deletes.len()
        );
    }
}
