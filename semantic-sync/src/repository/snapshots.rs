//! Repository for snapshot rows

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::model::SemanticModel;
use crate::snapshot::{Snapshot, SnapshotMeta};

const META_COLUMNS: &str = "id, sequence, source_tag, description, model_name, model_version, \
     table_count, column_count, measure_count, relationship_count, created_at";

fn meta_from_row(row: &SqliteRow) -> Result<SnapshotMeta> {
    let id: String = row.try_get("id")?;
    Ok(SnapshotMeta {
        id: Uuid::parse_str(&id).with_context(|| format!("Invalid snapshot id '{}'", id))?,
        sequence: row.try_get("sequence")?,
        source_tag: row.try_get("source_tag")?,
        description: row.try_get("description")?,
        model_name: row.try_get("model_name")?,
        model_version: row.try_get::<i64, _>("model_version")? as u64,
        table_count: row.try_get::<i64, _>("table_count")? as usize,
        column_count: row.try_get::<i64, _>("column_count")? as usize,
        measure_count: row.try_get::<i64, _>("measure_count")? as usize,
        relationship_count: row.try_get::<i64, _>("relationship_count")? as usize,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Store a new snapshot of `model`
///
/// The sequence number is allocated by the INSERT itself, so concurrent
/// captures queue on SQLite's write lock instead of failing the upgrade from
/// a read transaction.
pub async fn insert_snapshot(
    pool: &SqlitePool,
    model: &SemanticModel,
    source_tag: &str,
    description: &str,
) -> Result<Snapshot> {
    let model_json = serde_json::to_string(model).context("Failed to serialize model")?;
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    let sequence: i64 = sqlx::query(
        r#"
        INSERT INTO snapshots (
            id, sequence, source_tag, description, model_name, model_version,
            table_count, column_count, measure_count, relationship_count,
            model_json, created_at
        )
        SELECT ?, COALESCE(MAX(sequence), 0) + 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        FROM snapshots
        RETURNING sequence
        "#,
    )
    .bind(id.to_string())
    .bind(source_tag)
    .bind(description)
    .bind(&model.name)
    .bind(model.version as i64)
    .bind(model.table_count() as i64)
    .bind(model.column_count() as i64)
    .bind(model.measure_count() as i64)
    .bind(model.relationship_count() as i64)
    .bind(&model_json)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .context("Failed to insert snapshot")?
    .try_get("sequence")?;

    Ok(Snapshot {
        meta: SnapshotMeta {
            id,
            sequence,
            source_tag: source_tag.to_string(),
            description: description.to_string(),
            model_name: model.name.clone(),
            model_version: model.version,
            table_count: model.table_count(),
            column_count: model.column_count(),
            measure_count: model.measure_count(),
            relationship_count: model.relationship_count(),
            created_at,
        },
        model: model.clone(),
    })
}

pub async fn get_snapshot(pool: &SqlitePool, id: &Uuid) -> Result<Option<Snapshot>> {
    let row = sqlx::query(&format!(
        "SELECT {}, model_json FROM snapshots WHERE id = ?",
        META_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get snapshot")?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let model_json: String = row.try_get("model_json")?;
    let model: SemanticModel = serde_json::from_str(&model_json)
        .with_context(|| format!("Failed to deserialize model of snapshot {}", id))?;

    Ok(Some(Snapshot {
        meta: meta_from_row(&row)?,
        model,
    }))
}

/// Snapshot metadata, newest first
pub async fn list_snapshots(
    pool: &SqlitePool,
    source_tag: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<SnapshotMeta>> {
    let filter = if source_tag.is_some() {
        "WHERE source_tag = ?"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {} FROM snapshots {} ORDER BY sequence DESC LIMIT ?",
        META_COLUMNS, filter
    );

    let mut query = sqlx::query(&sql);
    if let Some(tag) = source_tag {
        query = query.bind(tag);
    }
    let rows = query
        .bind(limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(pool)
        .await
        .context("Failed to list snapshots")?;

    rows.iter().map(meta_from_row).collect()
}

pub async fn latest_snapshot(
    pool: &SqlitePool,
    source_tag: Option<&str>,
) -> Result<Option<SnapshotMeta>> {
    Ok(list_snapshots(pool, source_tag, Some(1))
        .await?
        .into_iter()
        .next())
}

/// Returns whether a row was removed
pub async fn delete_snapshot(pool: &SqlitePool, id: &Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM snapshots WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("Failed to delete snapshot")?;

    Ok(result.rows_affected() > 0)
}

/// Delete every snapshot older than the `keep_n` most recent; returns the removed ids
pub async fn cleanup_snapshots(pool: &SqlitePool, keep_n: usize) -> Result<Vec<Uuid>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let rows = sqlx::query("SELECT id FROM snapshots ORDER BY sequence DESC LIMIT -1 OFFSET ?")
        .bind(keep_n as i64)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to select expired snapshots")?;

    let mut removed = Vec::new();
    for row in rows {
        let id: String = row.try_get("id")?;
        sqlx::query("DELETE FROM snapshots WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expired snapshot")?;
        removed.push(Uuid::parse_str(&id).with_context(|| format!("Invalid snapshot id '{}'", id))?);
    }

    tx.commit().await.context("Failed to commit cleanup")?;
    Ok(removed)
}
