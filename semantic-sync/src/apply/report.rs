//! Per-change outcomes and their aggregate

use serde::{Deserialize, Serialize};

use crate::diff::{Change, ChangeKey};
use crate::error::SyncError;

/// Result of attempting one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Change executed; `data_loss` when a column had to be dropped and re-added
    Applied { data_loss: bool },
    /// Target already matched the after-value
    AlreadySatisfied,
    /// Run was cancelled before this change was attempted
    Cancelled,
    Failed { reason: String },
}

impl ApplyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::AlreadySatisfied => "skipped-already-satisfied",
            Self::Cancelled => "skipped-cancelled",
            Self::Failed { .. } => "failed",
        }
    }

    /// Fold a per-change error into the report; the change itself is recorded alongside
    pub fn from_error(err: SyncError) -> Self {
        let reason = match err {
            SyncError::Apply { reason, .. } => reason,
            other => other.to_string(),
        };
        Self::Failed { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub change: Change,
    pub status: ApplyStatus,
}

/// Failed change with its reason, as stored on a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedChange {
    pub change: String,
    pub reason: String,
}

/// Outcome of applying a change set, one entry per change in apply order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub outcomes: Vec<ChangeOutcome>,
}

impl ApplyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: &Change, status: ApplyStatus) {
        self.outcomes.push(ChangeOutcome {
            change: change.clone(),
            status,
        });
    }

    fn count(&self, matches: impl Fn(&ApplyStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| matches(&o.status)).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn applied_count(&self) -> usize {
        self.count(|s| matches!(s, ApplyStatus::Applied { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, ApplyStatus::AlreadySatisfied))
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(|s| matches!(s, ApplyStatus::Cancelled))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, ApplyStatus::Failed { .. }))
    }

    /// Every failed change with its reason, in apply order
    pub fn failures(&self) -> Vec<FailedChange> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                ApplyStatus::Failed { reason } => Some(FailedChange {
                    change: o.change.to_string(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Columns whose data was discarded by a drop-and-recreate type change
    pub fn data_loss_columns(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ApplyStatus::Applied { data_loss: true }))
            .filter_map(|o| match &o.change.key {
                ChangeKey::Column { table, column } => Some(format!("{}.{}", table, column)),
                _ => None,
            })
            .collect()
    }

    /// Nothing failed and nothing was cancelled
    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0 && self.cancelled_count() == 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled_count() > 0
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::EntityValue;
    use crate::model::{DataType, SemanticColumn};

    fn column_change(name: &str) -> Change {
        Change::add(
            ChangeKey::Column {
                table: "SALES".to_string(),
                column: name.to_string(),
            },
            EntityValue::Column(SemanticColumn::new(name, DataType::Int64)),
        )
    }

    #[test]
    fn test_counts_and_failures() {
        let mut report = ApplyReport::new();
        report.record(&column_change("A"), ApplyStatus::Applied { data_loss: false });
        report.record(&column_change("B"), ApplyStatus::AlreadySatisfied);
        report.record(
            &column_change("C"),
            ApplyStatus::Failed {
                reason: "locked".to_string(),
            },
        );
        report.record(&column_change("D"), ApplyStatus::Cancelled);

        assert_eq!(report.total(), 4);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.cancelled_count(), 1);
        assert!(!report.is_clean());

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].change, "ADD column 'SALES.C'");
        assert_eq!(failures[0].reason, "locked");
    }

    #[test]
    fn test_data_loss_columns() {
        let mut report = ApplyReport::new();
        report.record(&column_change("PRICE"), ApplyStatus::Applied { data_loss: true });
        report.record(&column_change("QTY"), ApplyStatus::Applied { data_loss: false });

        assert_eq!(report.data_loss_columns(), vec!["SALES.PRICE".to_string()]);
    }

    #[test]
    fn test_failed_status_from_apply_error() {
        let status = ApplyStatus::from_error(SyncError::Apply {
            change: "ADD column 'SALES.QTY'".to_string(),
            reason: "column already exists".to_string(),
        });
        assert_eq!(
            status,
            ApplyStatus::Failed {
                reason: "column already exists".to_string()
            }
        );
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ApplyStatus::AlreadySatisfied.label(), "skipped-already-satisfied");
        assert_eq!(ApplyStatus::Cancelled.label(), "skipped-cancelled");
    }
}
