//! Sync run state machine

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Lifecycle of a sync run
///
/// ```text
/// INITIATED -> VALIDATING -> EXTRACTING -> DIFFING -> APPLYING -> {COMPLETED, PARTIAL, FAILED}
/// ```
///
/// Transitions only move forward. Any non-terminal state may jump straight
/// to a terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Initiated,
    Validating,
    Extracting,
    Diffing,
    Applying,
    Completed,
    Partial,
    Failed,
}

impl SyncState {
    pub const ALL: [SyncState; 8] = [
        SyncState::Initiated,
        SyncState::Validating,
        SyncState::Extracting,
        SyncState::Diffing,
        SyncState::Applying,
        SyncState::Completed,
        SyncState::Partial,
        SyncState::Failed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::Validating => "VALIDATING",
            Self::Extracting => "EXTRACTING",
            Self::Diffing => "DIFFING",
            Self::Applying => "APPLYING",
            Self::Completed => "COMPLETED",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Initiated => 0,
            Self::Validating => 1,
            Self::Extracting => 2,
            Self::Diffing => 3,
            Self::Applying => 4,
            Self::Completed | Self::Partial | Self::Failed => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }

    pub fn can_transition_to(&self, next: SyncState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Checked transition
    pub fn transition(self, next: SyncState) -> SyncResult<SyncState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SyncError::InvalidTransition {
                from: self.label().to_string(),
                to: next.label().to_string(),
            })
        }
    }

    /// Process exit code for a finished run: 0 completed, 1 failed, 2 partial
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Partial => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|state| state.label().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown sync state '{}'", s))
    }
}
