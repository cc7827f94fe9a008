//! crmsync: mirror CRM leads, users, and roles into a local SQLite store.
//!
//! Usage:
//!   crmsync credentials set --access-token <T> --refresh-token <R>
//!   crmsync sync [--entity leads] [--concurrent]
//!   crmsync history --limit 10
//!   crmsync dump --entity leads --output leads.json
//!
//! A run is triggered by direct invocation; scheduling is left to cron or
//! a similar external scheduler.

use anyhow::Result;
use clap::Parser;
use crmsync_cli::{init_tracing, run, Args};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Unlocked: log events from runtime workers also write to stdout.
    let mut stdout = std::io::stdout();
    let ok = run(args, &mut stdout).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
