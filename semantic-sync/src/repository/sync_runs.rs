//! Repository for sync run audit rows

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::apply::FailedChange;
use crate::diff::SyncMode;
use crate::sync::{SyncRun, SyncState};

fn parse_state(value: &str) -> Result<SyncState> {
    value.parse::<SyncState>().map_err(|e| anyhow!(e))
}

fn run_from_row(row: &SqliteRow) -> Result<SyncRun> {
    let id: String = row.try_get("id")?;
    let state: String = row.try_get("state")?;
    let mode: String = row.try_get("mode")?;
    let failures_json: String = row.try_get("failures_json")?;
    let data_loss_json: String = row.try_get("data_loss_json")?;
    let error_state: Option<String> = row.try_get("error_state")?;
    let snapshot_id: Option<String> = row.try_get("snapshot_id")?;

    let failures: Vec<FailedChange> =
        serde_json::from_str(&failures_json).context("Failed to deserialize failures")?;
    let data_loss_columns: Vec<String> =
        serde_json::from_str(&data_loss_json).context("Failed to deserialize data loss columns")?;

    Ok(SyncRun {
        id: Uuid::parse_str(&id).with_context(|| format!("Invalid sync run id '{}'", id))?,
        source_tag: row.try_get("source_tag")?,
        target_tag: row.try_get("target_tag")?,
        state: parse_state(&state)?,
        mode: mode.parse::<SyncMode>().map_err(|e| anyhow!(e))?,
        dry_run: row.try_get::<i64, _>("dry_run")? != 0,
        changes_detected: row.try_get::<i64, _>("changes_detected")? as usize,
        changes_applied: row.try_get::<i64, _>("changes_applied")? as usize,
        changes_skipped: row.try_get::<i64, _>("changes_skipped")? as usize,
        changes_failed: row.try_get::<i64, _>("changes_failed")? as usize,
        changes_cancelled: row.try_get::<i64, _>("changes_cancelled")? as usize,
        failures,
        data_loss_columns,
        error_summary: row.try_get("error_summary")?,
        error_state: error_state.as_deref().map(parse_state).transpose()?,
        snapshot_id: snapshot_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .context("Invalid snapshot id on sync run")?,
        started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
        finished_at: row.try_get::<Option<DateTime<Utc>>, _>("finished_at")?,
    })
}

/// Record a newly started run
pub async fn insert_run(pool: &SqlitePool, run: &SyncRun) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_runs (id, source_tag, target_tag, state, mode, dry_run, started_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.id.to_string())
    .bind(&run.source_tag)
    .bind(&run.target_tag)
    .bind(run.state.label())
    .bind(run.mode.label())
    .bind(run.dry_run as i64)
    .bind(run.started_at)
    .execute(pool)
    .await
    .context("Failed to insert sync run")?;

    Ok(())
}

/// Write the current progress of a run; finalized rows reject the update
pub async fn update_run(pool: &SqlitePool, run: &SyncRun) -> Result<()> {
    let failures_json =
        serde_json::to_string(&run.failures).context("Failed to serialize failures")?;
    let data_loss_json = serde_json::to_string(&run.data_loss_columns)
        .context("Failed to serialize data loss columns")?;

    let result = sqlx::query(
        r#"
        UPDATE sync_runs SET
            state = ?,
            changes_detected = ?,
            changes_applied = ?,
            changes_skipped = ?,
            changes_failed = ?,
            changes_cancelled = ?,
            failures_json = ?,
            data_loss_json = ?,
            error_summary = ?,
            error_state = ?,
            snapshot_id = ?,
            finished_at = ?
        WHERE id = ?
        "#,
    )
    .bind(run.state.label())
    .bind(run.changes_detected as i64)
    .bind(run.changes_applied as i64)
    .bind(run.changes_skipped as i64)
    .bind(run.changes_failed as i64)
    .bind(run.changes_cancelled as i64)
    .bind(&failures_json)
    .bind(&data_loss_json)
    .bind(&run.error_summary)
    .bind(run.error_state.map(|s| s.label()))
    .bind(run.snapshot_id.map(|id| id.to_string()))
    .bind(run.finished_at)
    .bind(run.id.to_string())
    .execute(pool)
    .await
    .with_context(|| format!("Failed to update sync run {}", run.id))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("Sync run {} does not exist", run.id);
    }
    Ok(())
}

/// Write the terminal record of a run, inserting it when no progress row exists
pub async fn finalize_run(pool: &SqlitePool, run: &SyncRun) -> Result<()> {
    if !run.state.is_terminal() {
        anyhow::bail!("Sync run {} is still {}", run.id, run.state);
    }

    let failures_json =
        serde_json::to_string(&run.failures).context("Failed to serialize failures")?;
    let data_loss_json = serde_json::to_string(&run.data_loss_columns)
        .context("Failed to serialize data loss columns")?;

    sqlx::query(
        r#"
        INSERT INTO sync_runs (
            id, source_tag, target_tag, state, mode, dry_run,
            changes_detected, changes_applied, changes_skipped, changes_failed, changes_cancelled,
            failures_json, data_loss_json, error_summary, error_state, snapshot_id,
            started_at, finished_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            state = excluded.state,
            changes_detected = excluded.changes_detected,
            changes_applied = excluded.changes_applied,
            changes_skipped = excluded.changes_skipped,
            changes_failed = excluded.changes_failed,
            changes_cancelled = excluded.changes_cancelled,
            failures_json = excluded.failures_json,
            data_loss_json = excluded.data_loss_json,
            error_summary = excluded.error_summary,
            error_state = excluded.error_state,
            snapshot_id = excluded.snapshot_id,
            finished_at = excluded.finished_at
        "#,
    )
    .bind(run.id.to_string())
    .bind(&run.source_tag)
    .bind(&run.target_tag)
    .bind(run.state.label())
    .bind(run.mode.label())
    .bind(run.dry_run as i64)
    .bind(run.changes_detected as i64)
    .bind(run.changes_applied as i64)
    .bind(run.changes_skipped as i64)
    .bind(run.changes_failed as i64)
    .bind(run.changes_cancelled as i64)
    .bind(&failures_json)
    .bind(&data_loss_json)
    .bind(&run.error_summary)
    .bind(run.error_state.map(|s| s.label()))
    .bind(run.snapshot_id.map(|id| id.to_string()))
    .bind(run.started_at)
    .bind(run.finished_at)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to finalize sync run {}", run.id))?;

    Ok(())
}

pub async fn get_run(pool: &SqlitePool, id: &Uuid) -> Result<Option<SyncRun>> {
    let row = sqlx::query("SELECT * FROM sync_runs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("Failed to get sync run")?;

    row.as_ref().map(run_from_row).transpose()
}

/// Runs newest first
pub async fn list_runs(pool: &SqlitePool, limit: Option<usize>) -> Result<Vec<SyncRun>> {
    let rows = sqlx::query("SELECT * FROM sync_runs ORDER BY started_at DESC, rowid DESC LIMIT ?")
        .bind(limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(pool)
        .await
        .context("Failed to list sync runs")?;

    rows.iter().map(run_from_row).collect()
}

/// Delete finalized runs beyond the `keep_n` most recent; returns how many were removed
pub async fn cleanup_runs(pool: &SqlitePool, keep_n: usize) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM sync_runs
        WHERE state IN ('COMPLETED', 'PARTIAL', 'FAILED')
          AND id NOT IN (
            SELECT id FROM sync_runs ORDER BY started_at DESC, rowid DESC LIMIT ?
          )
        "#,
    )
    .bind(keep_n as i64)
    .execute(pool)
    .await
    .context("Failed to clean up sync runs")?;

    Ok(result.rows_affected())
}
