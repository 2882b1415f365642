//! Connector seams between the engine and the platforms it reads and writes
//!
//! Connectors speak raw, platform-native extracts; the engine normalises
//! everything it reads and renders everything it writes with the target's
//! dialect. Two implementations ship with the crate: an in-memory store used
//! by tests and embedders, and a JSON file store used by the CLI.

pub mod file;
pub mod memory;
mod schema_ops;

pub use file::FileConnector;
pub use memory::{MemoryConnector, WritePause};

use async_trait::async_trait;

use crate::model::{Dialect, RelationshipKey};
use crate::normalize::{RawColumn, RawMeasure, RawRelationship, RawSchema, RawTable};

/// Failure category reported by a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorErrorKind {
    /// Platform unreachable
    Connection,
    /// Temporary failure, worth retrying for read-only calls
    Transient,
    /// Entity addressed by the call does not exist
    NotFound,
    /// Operation not offered by this platform
    Unsupported,
    /// Platform refused the operation
    Rejected,
}

impl ConnectorErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Transient => "transient",
            Self::NotFound => "not found",
            Self::Unsupported => "unsupported",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorError {
    pub kind: ConnectorErrorKind,
    pub message: String,
}

impl ConnectorError {
    pub fn new(kind: ConnectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Connection, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Transient, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::NotFound, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Unsupported, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Rejected, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ConnectorErrorKind::Transient
    }
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.label())
    }
}

impl std::error::Error for ConnectorError {}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Read side of a platform
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Identity of the store, e.g. "snowflake-prod"
    fn tag(&self) -> &str;

    /// Native type dialect of everything this connector reads and writes
    fn dialect(&self) -> Dialect;

    /// Check the platform is reachable
    async fn ping(&self) -> ConnectorResult<()>;

    /// Extract the complete schema
    async fn read_schema(&self) -> ConnectorResult<RawSchema>;
}

/// Write side of a platform
///
/// Every primitive addresses one entity. Callers read the entity back with
/// the `read_*` calls to decide whether a change is still needed.
#[async_trait]
pub trait TargetConnector: SourceConnector {
    /// Whether `alter_column_type` changes a column in place
    fn supports_alter_column_type(&self) -> bool {
        true
    }

    async fn read_table(&self, table: &str) -> ConnectorResult<Option<RawTable>>;

    async fn read_measure(&self, name: &str) -> ConnectorResult<Option<RawMeasure>>;

    async fn read_relationship(
        &self,
        key: &RelationshipKey,
    ) -> ConnectorResult<Option<RawRelationship>>;

    async fn create_table(&self, table: &RawTable) -> ConnectorResult<()>;

    /// Update table description and hidden flag
    async fn set_table_metadata(
        &self,
        table: &str,
        description: Option<&str>,
        hidden: bool,
    ) -> ConnectorResult<()>;

    async fn drop_table(&self, table: &str) -> ConnectorResult<()>;

    async fn add_column(&self, table: &str, column: &RawColumn) -> ConnectorResult<()>;

    async fn alter_column_type(
        &self,
        table: &str,
        column: &str,
        native_type: &str,
    ) -> ConnectorResult<()>;

    /// Update every column attribute except its type
    async fn update_column(&self, table: &str, column: &RawColumn) -> ConnectorResult<()>;

    async fn drop_column(&self, table: &str, column: &str) -> ConnectorResult<()>;

    async fn upsert_measure(&self, measure: &RawMeasure) -> ConnectorResult<()>;

    async fn drop_measure(&self, name: &str) -> ConnectorResult<()>;

    async fn upsert_relationship(&self, relationship: &RawRelationship) -> ConnectorResult<()>;

    async fn drop_relationship(&self, key: &RelationshipKey) -> ConnectorResult<()>;
}
