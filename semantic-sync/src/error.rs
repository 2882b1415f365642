//! Error taxonomy for the sync engine
//!
//! Fatal errors abort a run and surface to the caller after the audit record
//! is written. `Apply` is the one per-change error: the applier raises it for
//! a single change and folds it into the `ApplyReport`, so it never ends a run.

use crate::connector::ConnectorError;

/// Errors raised by the sync engine
#[derive(Debug, Clone)]
pub enum SyncError {
    /// Source or target unreachable
    Connection { side: String, message: String },
    /// Raw extract could not be mapped into the canonical model
    SchemaRead { entity: String, message: String },
    /// Two changes resolved to the same (kind, key) pair
    DiffConflict { key: String },
    /// A single change could not be applied
    Apply { change: String, reason: String },
    /// Run could not start (run lock already held, bad request)
    Validation { message: String },
    /// Snapshot id unknown to the store
    SnapshotNotFound { id: String },
    /// Persistence backend failure
    Storage { message: String },
    /// Caller cancelled the run or its deadline elapsed
    Cancelled { state: String },
    /// Attempted to move a run backwards through its state machine
    InvalidTransition { from: String, to: String },
}

impl SyncError {
    pub fn schema_read(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaRead {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: format!("{:#}", err),
        }
    }

    /// Wrap a connector failure raised while talking to one side of a run
    pub fn from_connector(side: &str, err: ConnectorError) -> Self {
        Self::Connection {
            side: side.to_string(),
            message: err.to_string(),
        }
    }

    /// Short machine-friendly label, stored alongside error summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ConnectionError",
            Self::SchemaRead { .. } => "SchemaReadError",
            Self::DiffConflict { .. } => "DiffConflictError",
            Self::Apply { .. } => "ApplyError",
            Self::Validation { .. } => "ValidationError",
            Self::SnapshotNotFound { .. } => "SnapshotNotFound",
            Self::Storage { .. } => "StorageError",
            Self::Cancelled { .. } => "Cancelled",
            Self::InvalidTransition { .. } => "InvalidTransition",
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Connection { side, message } => {
                write!(f, "connection to {} failed: {}", side, message)
            }
            SyncError::SchemaRead { entity, message } => {
                write!(f, "cannot read schema at '{}': {}", entity, message)
            }
            SyncError::DiffConflict { key } => {
                write!(f, "change set would contain duplicate key {}", key)
            }
            SyncError::Apply { change, reason } => {
                write!(f, "failed to apply {}: {}", change, reason)
            }
            SyncError::Validation { message } => write!(f, "validation failed: {}", message),
            SyncError::SnapshotNotFound { id } => write!(f, "snapshot not found: {}", id),
            SyncError::Storage { message } => write!(f, "storage error: {}", message),
            SyncError::Cancelled { state } => write!(f, "run cancelled during {}", state),
            SyncError::InvalidTransition { from, to } => {
                write!(f, "invalid run state transition {} -> {}", from, to)
            }
        }
    }
}

impl std::error::Error for SyncError {}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_names_change() {
        let err = SyncError::Apply {
            change: "ADD column 'SALES.QTY'".to_string(),
            reason: "rejected".to_string(),
        };
        assert_eq!(err.to_string(), "failed to apply ADD column 'SALES.QTY': rejected");
        assert_eq!(err.kind(), "ApplyError");
    }

    #[test]
    fn test_schema_read_names_entity() {
        let err = SyncError::schema_read("SALES.GEO", "unknown native type 'GEOGRAPHY'");
        let msg = err.to_string();
        assert!(msg.contains("SALES.GEO"));
        assert!(msg.contains("GEOGRAPHY"));
        assert_eq!(err.kind(), "SchemaReadError");
    }
}
