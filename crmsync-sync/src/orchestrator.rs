//! Runs the configured entity pipelines.

use crate::config::SyncConfig;
use crate::credentials::CredentialProvider;
use crate::error::SyncResult;
use crate::pipeline::{PipelineError, RunPhase, RunReport, SyncPipeline};
use crate::remote::CrmClient;
use crate::schema::EntitySchema;
use crate::source::FetchOutcome;
use crmsync_store::RecordStore;
use crmsync_types::EntityKind;
use futures::future::join_all;
use tracing::info;

/// How pipelines are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Outcome of one entity pipeline.
#[derive(Debug)]
pub struct EntityRun {
    pub entity: EntityKind,
    pub result: Result<RunReport, PipelineError>,
}

impl EntityRun {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns nothing; wires one store, credential provider, and client into a
/// pipeline per entity kind.
pub struct SyncOrchestrator<'a, S: RecordStore> {
    config: &'a SyncConfig,
    store: &'a S,
    credentials: &'a dyn CredentialProvider,
    client: &'a CrmClient,
}

impl<'a, S: RecordStore> SyncOrchestrator<'a, S> {
    pub fn new(
        config: &'a SyncConfig,
        store: &'a S,
        credentials: &'a dyn CredentialProvider,
        client: &'a CrmClient,
    ) -> Self {
        Self {
            config,
            store,
            credentials,
            client,
        }
    }

    /// Runs every entity kind listed in the config.
    pub async fn run_configured(&self, mode: RunMode) -> Vec<EntityRun> {
        self.run(&self.config.entities, mode).await
    }

    /// Runs one pipeline per kind. A failed pipeline never stops or alters
    /// the others; every result is returned in `kinds` order.
    pub async fn run(&self, kinds: &[EntityKind], mode: RunMode) -> Vec<EntityRun> {
        info!("Syncing {} entity kinds ({:?})", kinds.len(), mode);
        match mode {
            RunMode::Sequential => {
                let mut runs = Vec::with_capacity(kinds.len());
                for kind in kinds {
                    runs.push(self.run_one(*kind).await);
                }
                runs
            }
            RunMode::Concurrent => join_all(kinds.iter().map(|kind| self.run_one(*kind))).await,
        }
    }

    async fn run_one(&self, kind: EntityKind) -> EntityRun {
        let fetcher = self.client.fetcher(EntitySchema::for_kind(kind));
        let result = match SyncPipeline::from_config(
            self.config,
            kind,
            self.store,
            self.credentials,
            &fetcher,
        ) {
            Ok(pipeline) => pipeline.run().await,
            Err(source) => Err(PipelineError {
                entity: kind,
                phase: RunPhase::FetchSource,
                source,
            }),
        };
        EntityRun {
            entity: kind,
            result,
        }
    }

    /// Fetches one kind's raw remote records without reconciling them.
    pub async fn dump(&self, kind: EntityKind) -> SyncResult<FetchOutcome> {
        let fetcher = self.client.fetcher(EntitySchema::for_kind(kind));
        SyncPipeline::from_config(self.config, kind, self.store, self.credentials, &fetcher)?
            .fetch_source()
            .await
    }
}
