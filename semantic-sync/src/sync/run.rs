//! Audit record of one sync run

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::SyncState;
use crate::apply::{ApplyReport, FailedChange};
use crate::diff::{ChangeSet, SyncMode};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub source_tag: String,
    pub target_tag: String,
    pub state: SyncState,
    pub mode: SyncMode,
    pub dry_run: bool,
    pub changes_detected: usize,
    pub changes_applied: usize,
    pub changes_skipped: usize,
    pub changes_failed: usize,
    pub changes_cancelled: usize,
    pub failures: Vec<FailedChange>,
    pub data_loss_columns: Vec<String>,
    /// "<kind>: <message>" of the fatal error, if any
    pub error_summary: Option<String>,
    /// State the run was in when the fatal error happened
    pub error_state: Option<SyncState>,
    /// Pre-sync snapshot of the target
    pub snapshot_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    pub fn new(source_tag: &str, target_tag: &str, mode: SyncMode, dry_run: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_tag: source_tag.to_string(),
            target_tag: target_tag.to_string(),
            state: SyncState::Initiated,
            mode,
            dry_run,
            changes_detected: 0,
            changes_applied: 0,
            changes_skipped: 0,
            changes_failed: 0,
            changes_cancelled: 0,
            failures: Vec::new(),
            data_loss_columns: Vec::new(),
            error_summary: None,
            error_state: None,
            snapshot_id: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn transition(&mut self, next: SyncState) -> SyncResult<()> {
        self.state = self.state.transition(next)?;
        info!("Sync run {} -> {}", self.id, self.state);
        if self.state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn record_changes(&mut self, changes: &ChangeSet) {
        self.changes_detected = changes.len();
    }

    pub fn record_report(&mut self, report: &ApplyReport) {
        self.changes_applied = report.applied_count();
        self.changes_skipped = report.skipped_count();
        self.changes_failed = report.failed_count();
        self.changes_cancelled = report.cancelled_count();
        self.failures = report.failures();
        self.data_loss_columns = report.data_loss_columns();
    }

    /// Terminal state for a finished apply
    pub fn outcome_state(report: &ApplyReport) -> SyncState {
        if report.is_clean() {
            SyncState::Completed
        } else if report.applied_count() > 0 {
            SyncState::Partial
        } else {
            SyncState::Failed
        }
    }

    /// Record the apply outcome and move to the matching terminal state
    pub fn finish(&mut self, report: &ApplyReport) -> SyncResult<()> {
        if self.state.is_terminal() {
            return Err(SyncError::InvalidTransition {
                from: self.state.label().to_string(),
                to: Self::outcome_state(report).label().to_string(),
            });
        }
        self.record_report(report);
        let state = Self::outcome_state(report);
        if state == SyncState::Failed {
            self.error_state = Some(self.state);
            self.error_summary = Some(if report.was_cancelled() {
                "Cancelled: run cancelled before any change was applied".to_string()
            } else {
                format!(
                    "ApplyError: all {} attempted changes failed",
                    report.failed_count()
                )
            });
        }
        self.transition(state)
    }

    /// Mark the run FAILED because of a fatal error in the current state
    pub fn fail(&mut self, err: &SyncError) -> SyncResult<()> {
        self.state.transition(SyncState::Failed)?;
        self.error_state = Some(self.state);
        self.error_summary = Some(format!("{}: {}", err.kind(), err));
        self.transition(SyncState::Failed)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }
}
