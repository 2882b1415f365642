//! sync and diff command handlers

use anyhow::Result;
use colored::*;
use log::warn;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{DiffArgs, SyncArgs};
use crate::cli::AppContext;
use crate::cli::output;
use semantic_sync::sync::{SyncOrchestrator, SyncState};

pub async fn handle_sync_command(ctx: &AppContext, args: SyncArgs) -> Result<i32> {
    let source = ctx.config.source(&args.source)?;
    let target = ctx.config.target(&args.target)?;

    let cancel = CancellationToken::new();
    let mut request = args
        .detect
        .apply(ctx.config.sync.request())
        .dry_run(args.dry_run)
        .cancel(cancel.clone());
    if args.no_snapshot {
        request = request.snapshot_before_apply(false);
    }
    if let Some(secs) = args.timeout {
        request = request.timeout(Some(Duration::from_secs(secs)));
    }

    // Ctrl-C stops the run between changes instead of killing it mid-write
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current change");
                cancel.cancel();
            }
        }
    });

    let orchestrator = ctx.orchestrator();
    let result = orchestrator
        .sync(source.as_ref(), target.as_ref(), request)
        .await;
    interrupt.abort();

    match result {
        Ok(outcome) => {
            output::print_changes(&outcome.changes);
            if let Some(report) = &outcome.report {
                output::print_report(report);
            }
            println!();
            output::print_run(&outcome.run);

            if !outcome.run.dry_run {
                enforce_retention(ctx, &orchestrator).await;
            }
            Ok(outcome.exit_code())
        }
        Err(err) => {
            eprintln!("{} {}", "Sync failed:".red().bold(), err);

            // The FAILED record, when the run got far enough to have one
            let runs = orchestrator.history(Some(1)).await.unwrap_or_default();
            if let Some(run) = runs.first() {
                if run.source_tag == args.source
                    && run.target_tag == args.target
                    && run.state == SyncState::Failed
                {
                    println!();
                    output::print_run(run);
                }
            }
            Ok(1)
        }
    }
}

pub async fn handle_diff_command(ctx: &AppContext, args: DiffArgs) -> Result<i32> {
    let source = ctx.config.source(&args.source)?;
    let target = ctx.config.target(&args.target)?;
    let request = args.detect.apply(ctx.config.sync.request());

    let changes = ctx
        .orchestrator()
        .preview(source.as_ref(), target.as_ref(), &request)
        .await?;

    println!(
        "{} {} {} {}",
        "Changes from".bold(),
        args.source.cyan(),
        "to".bold(),
        args.target.cyan()
    );
    output::print_changes(&changes);
    Ok(0)
}

async fn enforce_retention(ctx: &AppContext, orchestrator: &SyncOrchestrator) {
    let retention = &ctx.config.retention;
    if let Err(e) = ctx.store.cleanup(retention.keep_snapshots).await {
        warn!("Snapshot retention not applied: {}", e);
    }
    if let Err(e) = orchestrator.cleanup_history(retention.keep_sync_runs).await {
        warn!("Sync history retention not applied: {}", e);
    }
}
