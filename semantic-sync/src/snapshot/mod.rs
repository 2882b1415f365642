//! Snapshot store
//!
//! Write-once captures of canonical models and the restore path that diffs a
//! capture against the live target. Capture and restore share the store;
//! delete and cleanup take it exclusively.

mod types;

pub use types::{RestoreOutcome, RestorePolicy, RestoreRequest, Snapshot, SnapshotMeta};

use log::{info, warn};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::apply::Applier;
use crate::connector::{SourceConnector, TargetConnector};
use crate::diff::{ChangeKey, ChangeSet, DiffOptions, EntityValue, Operation, diff};
use crate::error::{SyncError, SyncResult};
use crate::model::SemanticModel;
use crate::normalize::normalize;
use crate::repository::{self, snapshots};

pub struct SnapshotStore {
    pool: SqlitePool,
    gate: RwLock<()>,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            gate: RwLock::new(()),
        }
    }

    /// Store backed by a private in-memory database
    pub async fn in_memory() -> SyncResult<Self> {
        let pool = repository::connect_memory()
            .await
            .map_err(SyncError::storage)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store `model` as a new snapshot
    pub async fn capture(
        &self,
        model: &SemanticModel,
        source_tag: &str,
        description: &str,
    ) -> SyncResult<Snapshot> {
        let _shared = self.gate.read().await;
        let snapshot = snapshots::insert_snapshot(&self.pool, model, source_tag, description)
            .await
            .map_err(SyncError::storage)?;

        info!(
            "Captured snapshot {} (#{}) of '{}' from '{}'",
            snapshot.meta.id, snapshot.meta.sequence, model.name, source_tag
        );
        Ok(snapshot)
    }

    /// Read the live schema from `connector` and capture it
    pub async fn capture_live<C>(&self, connector: &C, description: &str) -> SyncResult<Snapshot>
    where
        C: SourceConnector + ?Sized,
    {
        let raw = connector
            .read_schema()
            .await
            .map_err(|e| SyncError::from_connector(connector.tag(), e))?;
        let model = normalize(&raw, connector.tag())?;
        self.capture(&model, connector.tag(), description).await
    }

    /// Snapshot metadata, newest first
    pub async fn list(
        &self,
        source_tag: Option<&str>,
        limit: Option<usize>,
    ) -> SyncResult<Vec<SnapshotMeta>> {
        snapshots::list_snapshots(&self.pool, source_tag, limit)
            .await
            .map_err(SyncError::storage)
    }

    pub async fn latest(&self, source_tag: Option<&str>) -> SyncResult<Option<SnapshotMeta>> {
        snapshots::latest_snapshot(&self.pool, source_tag)
            .await
            .map_err(SyncError::storage)
    }

    pub async fn get(&self, id: &Uuid) -> SyncResult<Snapshot> {
        snapshots::get_snapshot(&self.pool, id)
            .await
            .map_err(SyncError::storage)?
            .ok_or_else(|| SyncError::SnapshotNotFound { id: id.to_string() })
    }

    pub async fn load(&self, id: &Uuid) -> SyncResult<SemanticModel> {
        Ok(self.get(id).await?.model)
    }

    pub async fn delete(&self, id: &Uuid) -> SyncResult<()> {
        let _exclusive = self.gate.write().await;
        let removed = snapshots::delete_snapshot(&self.pool, id)
            .await
            .map_err(SyncError::storage)?;
        if !removed {
            return Err(SyncError::SnapshotNotFound { id: id.to_string() });
        }
        info!("Deleted snapshot {}", id);
        Ok(())
    }

    /// Remove every snapshot older than the `keep_n` most recent
    pub async fn cleanup(&self, keep_n: usize) -> SyncResult<Vec<Uuid>> {
        let _exclusive = self.gate.write().await;
        let removed = snapshots::cleanup_snapshots(&self.pool, keep_n)
            .await
            .map_err(SyncError::storage)?;
        info!(
            "Snapshot cleanup kept {} most recent, removed {}",
            keep_n,
            removed.len()
        );
        Ok(removed)
    }

    /// Revert `target` to the state captured in snapshot `id`
    ///
    /// Computes `diff(live, snapshot)` with removal enabled, then applies it
    /// unless the request is a dry run.
    pub async fn restore(
        &self,
        id: &Uuid,
        target: &dyn TargetConnector,
        request: RestoreRequest,
        policy: RestorePolicy,
    ) -> SyncResult<RestoreOutcome> {
        let _shared = self.gate.read().await;
        let snapshot = self.get(id).await?;

        let raw = target
            .read_schema()
            .await
            .map_err(|e| SyncError::from_connector(target.tag(), e))?;
        let live = normalize(&raw, target.tag())?;

        let changes = diff(&live, &snapshot.model, &DiffOptions::restore())?;
        let (changes, retained_tables) = apply_retention(changes, policy);
        if !retained_tables.is_empty() {
            warn!(
                "Restore of {} keeps tables created after the snapshot: {}",
                id,
                retained_tables.join(", ")
            );
        }

        let summary = changes.summary();
        info!(
            "Restore of {} onto '{}': {} additions, {} modifications, {} removals{}",
            id,
            target.tag(),
            summary.added,
            summary.modified,
            summary.removed,
            if request.writes() { "" } else { " (not applied)" }
        );

        let report = if request.writes() {
            Some(Applier::new(target).apply(&changes).await)
        } else {
            None
        };

        Ok(RestoreOutcome {
            snapshot_id: *id,
            changes,
            report,
            retained_tables,
        })
    }
}

/// Drop removals of live-only tables (and what hangs off them) when the policy retains them
pub fn apply_retention(changes: ChangeSet, policy: RestorePolicy) -> (ChangeSet, Vec<String>) {
    if !policy.retain_new_tables {
        return (changes, Vec::new());
    }

    let new_tables: Vec<String> = changes
        .iter()
        .filter(|c| c.operation == Operation::Remove)
        .filter_map(|c| match &c.key {
            ChangeKey::Table { table } => Some(table.clone()),
            _ => None,
        })
        .collect();

    if new_tables.is_empty() {
        return (changes, new_tables);
    }

    let is_new = |table: &str| new_tables.iter().any(|t| t == table);
    let kept = changes.filtered(|c| {
        if c.operation != Operation::Remove {
            return true;
        }
        match (&c.key, c.before.as_ref()) {
            (ChangeKey::Table { table }, _) => !is_new(table),
            (ChangeKey::Measure { .. }, Some(EntityValue::Measure(m))) => !is_new(&m.table),
            (ChangeKey::Relationship(key), _) => {
                !new_tables.iter().any(|t| key.touches_table(t))
            }
            _ => true,
        }
    });

    (kept, new_tables)
}
