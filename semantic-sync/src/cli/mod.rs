//! Command line interface

pub mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use semantic_sync::config::Config;
use semantic_sync::repository;
use semantic_sync::resilience::RetryPolicy;
use semantic_sync::snapshot::SnapshotStore;
use semantic_sync::sync::SyncOrchestrator;

use commands::history::HistoryArgs;
use commands::snapshot::SnapshotCommands;
use commands::sync::{DiffArgs, SyncArgs};

#[derive(Parser)]
#[command(
    name = "semantic-sync",
    version,
    about = "Keep a BI semantic model in line with its warehouse, with snapshots to roll back"
)]
pub struct Cli {
    /// Configuration file (default: <config dir>/semantic-sync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring a target in line with a source
    Sync(SyncArgs),
    /// Show the changes a sync would make, without starting a run
    Diff(DiffArgs),
    /// Capture, inspect and restore snapshots
    #[command(subcommand)]
    Snapshot(SnapshotCommands),
    /// Past sync runs
    History(HistoryArgs),
}

/// Configuration and storage shared by every handler
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SnapshotStore>,
}

impl AppContext {
    pub async fn open(config: Config) -> Result<Self> {
        let pool = repository::connect(&config.database_path).await?;
        Ok(Self {
            config,
            store: Arc::new(SnapshotStore::new(pool)),
        })
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.store.clone())
            .with_retry(RetryPolicy::new(self.config.retry.to_retry_config()))
    }
}

/// Run the parsed command and return the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::open(config).await?;

    match cli.command {
        Commands::Sync(args) => commands::sync::handle_sync_command(&ctx, args).await,
        Commands::Diff(args) => commands::sync::handle_diff_command(&ctx, args).await,
        Commands::Snapshot(command) => {
            commands::snapshot::handle_snapshot_command(&ctx, command).await
        }
        Commands::History(args) => commands::history::handle_history_command(&ctx, args).await,
    }
}
