//! snapshot command handlers

use anyhow::Result;
use colored::*;

use super::SnapshotCommands;
use crate::cli::AppContext;
use crate::cli::output;
use semantic_sync::snapshot::{RestorePolicy, RestoreRequest};
use semantic_sync::sync::SyncRun;

pub async fn handle_snapshot_command(ctx: &AppContext, command: SnapshotCommands) -> Result<i32> {
    match command {
        SnapshotCommands::Create {
            source,
            description,
        } => {
            let connector = ctx.config.source(&source)?;
            let snapshot = ctx
                .store
                .capture_live(connector.as_ref(), &description)
                .await?;
            println!(
                "{} {} (#{})",
                "Captured snapshot".green().bold(),
                snapshot.meta.id.to_string().cyan(),
                snapshot.meta.sequence
            );
            output::print_snapshot_list(std::slice::from_ref(&snapshot.meta));
        }

        SnapshotCommands::List { source, limit } => {
            let snapshots = ctx.store.list(source.as_deref(), limit).await?;
            if snapshots.is_empty() {
                println!("{}", "No snapshots".dimmed());
            } else {
                output::print_snapshot_list(&snapshots);
            }
        }

        SnapshotCommands::Show { id } => {
            let snapshot = ctx.store.get(&id).await?;
            output::print_snapshot(&snapshot);
        }

        SnapshotCommands::Restore {
            id,
            target,
            dry_run,
            plan,
            remove_new_tables,
        } => {
            let connector = ctx.config.target(&target)?;
            let request = if plan {
                RestoreRequest::plan()
            } else if dry_run {
                RestoreRequest::dry_run()
            } else {
                RestoreRequest::apply()
            };
            let policy = if remove_new_tables {
                RestorePolicy::remove_new_tables()
            } else {
                ctx.config.restore.policy()
            };

            let outcome = ctx
                .store
                .restore(&id, connector.as_ref(), request, policy)
                .await?;

            output::print_changes(&outcome.changes);
            if !outcome.retained_tables.is_empty() {
                println!(
                    "{} {}",
                    "Kept tables created after the snapshot:".yellow(),
                    outcome.retained_tables.join(", ")
                );
            }

            if let Some(report) = &outcome.report {
                output::print_report(report);
                return Ok(SyncRun::outcome_state(report).exit_code());
            }
            let note = if request.apply {
                "Dry run, target not changed"
            } else {
                "Plan only, target not changed"
            };
            println!("{}", note.dimmed());
        }

        SnapshotCommands::Delete { id } => {
            ctx.store.delete(&id).await?;
            println!("{} {}", "Deleted snapshot".green(), id);
        }

        SnapshotCommands::Cleanup { keep } => {
            let keep = keep.unwrap_or(ctx.config.retention.keep_snapshots);
            let removed = ctx.store.cleanup(keep).await?;
            println!(
                "{} {} snapshot(s), kept the {} most recent",
                "Removed".green(),
                removed.len(),
                keep
            );
            for id in removed {
                println!("  {}", id.to_string().dimmed());
            }
        }
    }

    Ok(0)
}
