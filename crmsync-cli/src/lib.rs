//! Argument parsing and command dispatch for the `crmsync` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crmsync_store::{CredentialStore, SqliteStore};
use crmsync_sync::{CrmClient, EntityRun, OAuthCredentialProvider, RunMode, SyncConfig, SyncOrchestrator};
use crmsync_types::{Credentials, EntityKind, RunMetrics};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crmsync")]
#[command(about = "Mirror CRM leads, users, and roles into a local SQLite store")]
pub struct Args {
    /// JSON config file; missing keys take their defaults
    #[arg(short, long, global = true, env = "CRMSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true, env = "CRMSYNC_DATABASE", default_value = "crmsync.db")]
    pub database: PathBuf,

    /// OAuth client ID (overrides the config file)
    #[arg(long, global = true, env = "CRMSYNC_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret (overrides the config file)
    #[arg(long, global = true, env = "CRMSYNC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile entity collections against the local store
    Sync {
        /// Entity kinds to sync (repeatable); defaults to the config's list
        #[arg(short, long = "entity", value_delimiter = ',')]
        entities: Vec<EntityKind>,

        /// Run the pipelines concurrently instead of one after another
        #[arg(long)]
        concurrent: bool,
    },
    /// Manage stored OAuth credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsCommand,
    },
    /// Show recorded runs, newest first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Write one entity's raw remote records to a JSON file
    Dump {
        #[arg(short, long)]
        entity: EntityKind,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Store an access/refresh token pair
    Set {
        #[arg(long, env = "CRMSYNC_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long, env = "CRMSYNC_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
}

/// Installs the global subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Config file (or defaults) with command-line overrides applied.
pub fn load_config(args: &Args) -> Result<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SyncConfig::default(),
    };
    if let Some(id) = &args.client_id {
        config.client_id = id.clone();
    }
    if let Some(secret) = &args.client_secret {
        config.client_secret = secret.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Runs one command. Returns `false` when any entity run failed.
pub async fn run(args: Args, out: &mut impl Write) -> Result<bool> {
    let config = load_config(&args)?;
    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("failed to open {}", args.database.display()))?;

    match args.command {
        Command::Credentials {
            action:
                CredentialsCommand::Set {
                    access_token,
                    refresh_token,
                },
        } => {
            store.save_credentials(&Credentials::new(access_token, refresh_token))?;
            info!("Stored credentials in {}", args.database.display());
            writeln!(out, "credentials saved")?;
            Ok(true)
        }
        Command::History { limit } => {
            let runs = store.recent_runs(limit)?;
            write!(out, "{}", format_history(&runs))?;
            Ok(true)
        }
        Command::Sync {
            entities,
            concurrent,
        } => {
            let provider = OAuthCredentialProvider::new(&config, Arc::new(store.clone()))?;
            let client = CrmClient::new(&config)?;
            let orchestrator = SyncOrchestrator::new(&config, &store, &provider, &client);
            let mode = if concurrent {
                RunMode::Concurrent
            } else {
                RunMode::Sequential
            };

            let runs = if entities.is_empty() {
                orchestrator.run_configured(mode).await
            } else {
                orchestrator.run(&entities, mode).await
            };
            for entity_run in &runs {
                writeln!(out, "{}", format_run(entity_run))?;
            }
            Ok(runs.iter().all(EntityRun::is_success))
        }
        Command::Dump { entity, output } => {
            let provider = OAuthCredentialProvider::new(&config, Arc::new(store.clone()))?;
            let client = CrmClient::new(&config)?;
            let orchestrator = SyncOrchestrator::new(&config, &store, &provider, &client);

            let fetched = orchestrator
                .dump(entity)
                .await
                .with_context(|| format!("failed to fetch {entity}"))?;
            write_dump(&output, &fetched.records)?;
            info!("Wrote {} {} to {}", fetched.records.len(), entity, output.display());
            writeln!(out, "{} {} written to {}", fetched.records.len(), entity, output.display())?;
            Ok(true)
        }
    }
}

/// One summary line per entity run.
pub fn format_run(entity_run: &EntityRun) -> String {
    match &entity_run.result {
        Ok(report) => {
            let m = &report.metrics;
            let mut line = format!(
                "{:<6} ok      +{} ~{} -{} ({} failed rows, {} pages, {}ms)",
                entity_run.entity.as_str(),
                m.insert_count,
                m.update_count,
                m.delete_count,
                m.failed_rows,
                report.pages,
                m.duration_ms
            );
            if report.truncated {
                line.push_str(" [truncated]");
            }
            line
        }
        Err(e) => format!(
            "{:<6} FAILED  {}: {}",
            entity_run.entity.as_str(),
            e.phase,
            e.source
        ),
    }
}

/// Tabular run history.
pub fn format_history(runs: &[RunMetrics]) -> String {
    if runs.is_empty() {
        return "no runs recorded\n".to_string();
    }
    let mut table = format!(
        "{:<25} {:<6} {:>8} {:>7} {:>7} {:>7} {:>6}\n",
        "started", "entity", "ms", "insert", "update", "delete", "failed"
    );
    for run in runs {
        table.push_str(&format!(
            "{:<25} {:<6} {:>8} {:>7} {:>7} {:>7} {:>6}\n",
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.entity.as_str(),
            run.duration_ms,
            run.insert_count,
            run.update_count,
            run.delete_count,
            run.failed_rows
        ));
    }
    table
}

/// Writes raw records as pretty-printed JSON.
pub fn write_dump(path: &Path, records: &[serde_json::Value]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}
