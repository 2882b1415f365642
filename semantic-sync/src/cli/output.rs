//! Human-readable rendering of change sets, reports, runs and snapshots

use colored::*;

use semantic_sync::apply::{ApplyReport, ApplyStatus};
use semantic_sync::diff::{Change, ChangeSet, Operation};
use semantic_sync::snapshot::{Snapshot, SnapshotMeta};
use semantic_sync::sync::{SyncRun, SyncState};

fn change_line(change: &Change) -> ColoredString {
    let line = format!("{} {}", change.operation.symbol(), change);
    match change.operation {
        Operation::Add => line.green(),
        Operation::Modify if change.destructive => line.yellow().bold(),
        Operation::Modify => line.yellow(),
        Operation::Remove => line.red(),
    }
}

pub fn print_changes(changes: &ChangeSet) {
    if changes.is_empty() {
        println!("{}", "No changes".dimmed());
        return;
    }

    for change in changes.iter() {
        println!("  {}", change_line(change));
    }

    let summary = changes.summary();
    println!(
        "{} {} to add, {} to modify, {} to remove",
        "Plan:".bold(),
        summary.added.to_string().green(),
        summary.modified.to_string().yellow(),
        summary.removed.to_string().red()
    );
    if summary.destructive > 0 {
        println!(
            "{} {} change(s) may rebuild a column and lose its data",
            "Warning:".yellow().bold(),
            summary.destructive
        );
    }
}

fn status_label(status: &ApplyStatus) -> ColoredString {
    match status {
        ApplyStatus::Applied { data_loss: true } => "applied (data lost)".yellow(),
        ApplyStatus::Applied { .. } => "applied".green(),
        ApplyStatus::AlreadySatisfied => status.label().dimmed(),
        ApplyStatus::Cancelled => status.label().yellow(),
        ApplyStatus::Failed { .. } => status.label().red().bold(),
    }
}

pub fn print_report(report: &ApplyReport) {
    println!();
    for outcome in &report.outcomes {
        println!("  {:<28} {}", status_label(&outcome.status), outcome.change);
        if let ApplyStatus::Failed { reason } = &outcome.status {
            println!("  {:<28} {}", "", reason.red());
        }
    }

    println!(
        "{} {} applied, {} skipped, {} cancelled, {} failed",
        "Result:".bold(),
        report.applied_count(),
        report.skipped_count(),
        report.cancelled_count(),
        report.failed_count()
    );

    let lost = report.data_loss_columns();
    if !lost.is_empty() {
        println!(
            "{} data in {} was dropped while changing the column type",
            "Warning:".yellow().bold(),
            lost.join(", ")
        );
    }
}

fn state_label(state: SyncState) -> ColoredString {
    match state {
        SyncState::Completed => state.label().green().bold(),
        SyncState::Partial => state.label().yellow().bold(),
        SyncState::Failed => state.label().red().bold(),
        _ => state.label().cyan(),
    }
}

pub fn print_run(run: &SyncRun) {
    println!(
        "{} {} {} -> {}{}",
        "Run".bold(),
        run.id.to_string().cyan(),
        run.source_tag,
        run.target_tag,
        if run.dry_run { " (dry run)" } else { "" }
    );
    println!("  State:    {}", state_label(run.state));
    println!("  Mode:     {}", run.mode);
    println!("  Started:  {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(duration) = run.duration() {
        println!("  Duration: {:.2}s", duration.num_milliseconds() as f64 / 1000.0);
    }
    println!(
        "  Changes:  {} detected, {} applied, {} skipped, {} cancelled, {} failed",
        run.changes_detected,
        run.changes_applied,
        run.changes_skipped,
        run.changes_cancelled,
        run.changes_failed
    );
    if let Some(id) = run.snapshot_id {
        println!("  Snapshot: {}", id);
    }

    if !run.failures.is_empty() {
        println!("  {}", "Failed changes:".red().bold());
        for failure in &run.failures {
            println!("    {}: {}", failure.change, failure.reason);
        }
    }
    if !run.data_loss_columns.is_empty() {
        println!(
            "  {} {}",
            "Data lost in:".yellow(),
            run.data_loss_columns.join(", ")
        );
    }
    if let Some(summary) = &run.error_summary {
        let during = run
            .error_state
            .map(|s| format!(" (during {})", s))
            .unwrap_or_default();
        println!("  {} {}{}", "Error:".red().bold(), summary, during);
    }
}

pub fn print_run_line(run: &SyncRun) {
    println!(
        "{}  {}  {:<22} {:<10} {}/{} applied{}",
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.id.to_string().dimmed(),
        format!("{} -> {}", run.source_tag, run.target_tag),
        state_label(run.state),
        run.changes_applied,
        run.changes_detected,
        if run.dry_run { ", dry run" } else { "" }
    );
}

pub fn print_snapshot_list(snapshots: &[SnapshotMeta]) {
    for meta in snapshots {
        println!(
            "{:>4}  {}  {}  {:<14} {} tables, {} columns, {} measures, {} relationships  {}",
            meta.sequence,
            meta.id.to_string().cyan(),
            meta.created_at.format("%Y-%m-%d %H:%M:%S"),
            meta.source_tag,
            meta.table_count,
            meta.column_count,
            meta.measure_count,
            meta.relationship_count,
            meta.description.dimmed()
        );
    }
}

pub fn print_snapshot(snapshot: &Snapshot) {
    let meta = &snapshot.meta;
    let model = &snapshot.model;
    println!(
        "{} {} (#{}) of '{}' from {}",
        "Snapshot".bold(),
        meta.id.to_string().cyan(),
        meta.sequence,
        model.name,
        meta.source_tag
    );
    println!("  Captured: {}", meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if !meta.description.is_empty() {
        println!("  Note:     {}", meta.description);
    }

    for table in &model.tables {
        println!("  {}{}", table.name.bold(), if table.hidden { " (hidden)" } else { "" });
        for column in &table.columns {
            println!(
                "    {:<32} {}{}",
                column.name,
                column.data_type,
                if column.nullable { "" } else { " not null" }
            );
        }
    }

    if !model.measures.is_empty() {
        println!("  {}", "Measures".bold());
        for measure in &model.measures {
            println!("    {} [{}] = {}", measure.name, measure.table, measure.expression.dimmed());
        }
    }

    if !model.relationships.is_empty() {
        println!("  {}", "Relationships".bold());
        for rel in &model.relationships {
            println!(
                "    {} ({}{})",
                rel.key,
                rel.cardinality.label(),
                if rel.active { "" } else { ", inactive" }
            );
        }
    }
}
