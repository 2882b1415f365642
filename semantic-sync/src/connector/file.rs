//! JSON file connector
//!
//! Stores one raw schema per file. Every write loads the file, mutates the
//! schema and writes it back through a temporary file so a crash never
//! leaves a half-written store behind.

use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{ConnectorError, ConnectorResult, SourceConnector, TargetConnector, schema_ops};
use crate::model::{Dialect, RelationshipKey};
use crate::normalize::{RawColumn, RawMeasure, RawRelationship, RawSchema, RawTable};

pub struct FileConnector {
    tag: String,
    dialect: Dialect,
    path: PathBuf,
    alter_in_place: bool,
    write_lock: Mutex<()>,
}

impl FileConnector {
    pub fn new(tag: &str, path: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            tag: tag.to_string(),
            dialect,
            path: path.into(),
            alter_in_place: true,
            write_lock: Mutex::new(()),
        }
    }

    pub fn without_alter_column_type(mut self) -> Self {
        self.alter_in_place = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `schema` as the complete contents of the store
    pub async fn initialize(&self, schema: &RawSchema) -> ConnectorResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store(schema).await
    }

    async fn load(&self) -> ConnectorResult<RawSchema> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ConnectorError::connection(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let schema: RawSchema = serde_json::from_str(&content).map_err(|e| {
            ConnectorError::rejected(format!("malformed schema file {}: {}", self.path.display(), e))
        })?;

        if schema.dialect != self.dialect {
            return Err(ConnectorError::rejected(format!(
                "{} holds a {} schema, expected {}",
                self.path.display(),
                schema.dialect,
                self.dialect
            )));
        }
        Ok(schema)
    }

    async fn store(&self, schema: &RawSchema) -> ConnectorResult<()> {
        let json = serde_json::to_string_pretty(schema)
            .map_err(|e| ConnectorError::rejected(format!("cannot serialize schema: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            ConnectorError::connection(format!("cannot write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ConnectorError::connection(format!("cannot replace {}: {}", self.path.display(), e))
        })
    }

    async fn write<F>(&self, label: String, op: F) -> ConnectorResult<()>
    where
        F: FnOnce(&mut RawSchema) -> ConnectorResult<()> + Send,
    {
        let _guard = self.write_lock.lock().await;
        debug!("[{}] {}", self.tag, label);

        let mut schema = self.load().await?;
        op(&mut schema)?;
        self.store(&schema).await
    }
}

#[async_trait]
impl SourceConnector for FileConnector {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn ping(&self) -> ConnectorResult<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(ConnectorError::connection(format!(
                "{} is not a file",
                self.path.display()
            ))),
            Err(e) => Err(ConnectorError::connection(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn read_schema(&self) -> ConnectorResult<RawSchema> {
        self.load().await
    }
}

#[async_trait]
impl TargetConnector for FileConnector {
    fn supports_alter_column_type(&self) -> bool {
        self.alter_in_place
    }

    async fn read_table(&self, table: &str) -> ConnectorResult<Option<RawTable>> {
        Ok(schema_ops::read_table(&self.load().await?, table))
    }

    async fn read_measure(&self, name: &str) -> ConnectorResult<Option<RawMeasure>> {
        Ok(schema_ops::read_measure(&self.load().await?, name))
    }

    async fn read_relationship(
        &self,
        key: &RelationshipKey,
    ) -> ConnectorResult<Option<RawRelationship>> {
        Ok(schema_ops::read_relationship(&self.load().await?, key))
    }

    async fn create_table(&self, table: &RawTable) -> ConnectorResult<()> {
        self.write(format!("create_table {}", table.name), |s| {
            schema_ops::create_table(s, table)
        })
        .await
    }

    async fn set_table_metadata(
        &self,
        table: &str,
        description: Option<&str>,
        hidden: bool,
    ) -> ConnectorResult<()> {
        self.write(format!("set_table_metadata {}", table), |s| {
            schema_ops::set_table_metadata(s, table, description, hidden)
        })
        .await
    }

    async fn drop_table(&self, table: &str) -> ConnectorResult<()> {
        self.write(format!("drop_table {}", table), |s| {
            schema_ops::drop_table(s, table)
        })
        .await
    }

    async fn add_column(&self, table: &str, column: &RawColumn) -> ConnectorResult<()> {
        self.write(format!("add_column {}.{}", table, column.name), |s| {
            schema_ops::add_column(s, table, column)
        })
        .await
    }

    async fn alter_column_type(
        &self,
        table: &str,
        column: &str,
        native_type: &str,
    ) -> ConnectorResult<()> {
        if !self.alter_in_place {
            return Err(ConnectorError::unsupported(
                "column types cannot be altered in place",
            ));
        }
        self.write(format!("alter_column_type {}.{}", table, column), |s| {
            schema_ops::alter_column_type(s, table, column, native_type)
        })
        .await
    }

    async fn update_column(&self, table: &str, column: &RawColumn) -> ConnectorResult<()> {
        self.write(format!("update_column {}.{}", table, column.name), |s| {
            schema_ops::update_column(s, table, column)
        })
        .await
    }

    async fn drop_column(&self, table: &str, column: &str) -> ConnectorResult<()> {
        self.write(format!("drop_column {}.{}", table, column), |s| {
            schema_ops::drop_column(s, table, column)
        })
        .await
    }

    async fn upsert_measure(&self, measure: &RawMeasure) -> ConnectorResult<()> {
        self.write(format!("upsert_measure {}", measure.name), |s| {
            schema_ops::upsert_measure(s, measure)
        })
        .await
    }

    async fn drop_measure(&self, name: &str) -> ConnectorResult<()> {
        self.write(format!("drop_measure {}", name), |s| {
            schema_ops::drop_measure(s, name)
        })
        .await
    }

    async fn upsert_relationship(&self, relationship: &RawRelationship) -> ConnectorResult<()> {
        self.write(
            format!(
                "upsert_relationship {}.{}->{}.{}",
                relationship.from_table,
                relationship.from_column,
                relationship.to_table,
                relationship.to_column
            ),
            |s| schema_ops::upsert_relationship(s, relationship),
        )
        .await
    }

    async fn drop_relationship(&self, key: &RelationshipKey) -> ConnectorResult<()> {
        self.write(format!("drop_relationship {}", key), |s| {
            schema_ops::drop_relationship(s, key)
        })
        .await
    }
}
