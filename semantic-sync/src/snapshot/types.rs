use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::apply::ApplyReport;
use crate::diff::ChangeSet;
use crate::model::SemanticModel;

/// Listing entry for a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: Uuid,
    /// Monotonic across the whole store
    pub sequence: i64,
    pub source_tag: String,
    pub description: String,
    pub model_name: String,
    pub model_version: u64,
    pub table_count: usize,
    pub column_count: usize,
    pub measure_count: usize,
    pub relationship_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A stored snapshot with its model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub model: SemanticModel,
}

/// How a restore treats tables that were created after the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorePolicy {
    /// Keep live tables unknown to the snapshot, with their measures and relationships
    pub retain_new_tables: bool,
}

impl Default for RestorePolicy {
    fn default() -> Self {
        Self {
            retain_new_tables: true,
        }
    }
}

impl RestorePolicy {
    pub fn remove_new_tables() -> Self {
        Self {
            retain_new_tables: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreRequest {
    /// Run the applier at all
    pub apply: bool,
    /// Compute the change set but leave the target untouched
    pub dry_run: bool,
}

impl RestoreRequest {
    pub fn apply() -> Self {
        Self {
            apply: true,
            dry_run: false,
        }
    }

    /// Only compute the change set; the applier is never constructed
    pub fn plan() -> Self {
        Self {
            apply: false,
            dry_run: false,
        }
    }

    pub fn dry_run() -> Self {
        Self {
            apply: true,
            dry_run: true,
        }
    }

    pub fn writes(&self) -> bool {
        self.apply && !self.dry_run
    }
}

/// What a restore did, or would do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub snapshot_id: Uuid,
    pub changes: ChangeSet,
    /// Absent when nothing was applied
    pub report: Option<ApplyReport>,
    /// Live-only tables left in place by the retention policy
    pub retained_tables: Vec<String>,
}
