//! In-memory connector
//!
//! Holds a raw schema behind a lock and offers fault injection so the engine
//! can be exercised against unreachable, flaky or refusing targets.

use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;

use super::{ConnectorError, ConnectorResult, SourceConnector, TargetConnector, schema_ops};
use crate::model::{Dialect, RelationshipKey};
use crate::normalize::{RawColumn, RawMeasure, RawRelationship, RawSchema, RawTable};

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    transient_reads: u32,
    failing: HashSet<String>,
    cancel_after: Option<(usize, CancellationToken)>,
    pause_after: Option<WritePause>,
}

/// Holds the connector still once a number of writes have gone through
#[derive(Debug, Clone)]
pub struct WritePause {
    after: usize,
    /// Notified when the connector stops
    pub reached: Arc<Notify>,
    /// Notify to let the connector carry on
    pub resume: Arc<Notify>,
}

pub struct MemoryConnector {
    tag: String,
    dialect: Dialect,
    alter_in_place: bool,
    schema: RwLock<RawSchema>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new(tag: &str, schema: RawSchema) -> Self {
        Self {
            tag: tag.to_string(),
            dialect: schema.dialect,
            alter_in_place: true,
            schema: RwLock::new(schema),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn empty(tag: &str, dialect: Dialect) -> Self {
        Self::new(tag, RawSchema::empty(tag, dialect))
    }

    /// Behave like a platform that cannot change a column type in place
    pub fn without_alter_column_type(mut self) -> Self {
        self.alter_in_place = false;
        self
    }

    /// Current contents of the store
    pub async fn schema(&self) -> RawSchema {
        self.schema.read().await.clone()
    }

    /// Make every call fail with a connection error
    pub async fn set_offline(&self, offline: bool) {
        self.faults.lock().await.offline = offline;
    }

    /// Fail the next `count` schema reads with a transient error
    pub async fn fail_next_reads(&self, count: u32) {
        self.faults.lock().await.transient_reads = count;
    }

    /// Reject the write primitive named `label`, e.g. `add_column SALES.QTY`
    pub async fn fail_on(&self, label: &str) {
        self.faults.lock().await.failing.insert(label.to_string());
    }

    /// Cancel `token` once `writes` write primitives have gone through
    pub async fn cancel_after_writes(&self, writes: usize, token: CancellationToken) {
        self.faults.lock().await.cancel_after = Some((writes, token));
    }

    /// Stop inside the write primitive that brings the count to `writes`
    pub async fn pause_after_writes(&self, writes: usize) -> WritePause {
        let pause = WritePause {
            after: writes,
            reached: Arc::new(Notify::new()),
            resume: Arc::new(Notify::new()),
        };
        self.faults.lock().await.pause_after = Some(pause.clone());
        pause
    }

    pub async fn clear_faults(&self) {
        *self.faults.lock().await = Faults::default();
    }

    /// Labels of every write primitive attempted so far
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn check_online(&self) -> ConnectorResult<()> {
        if self.faults.lock().await.offline {
            return Err(ConnectorError::connection(format!(
                "store '{}' is offline",
                self.tag
            )));
        }
        Ok(())
    }

    async fn write<F>(&self, label: String, op: F) -> ConnectorResult<()>
    where
        F: FnOnce(&mut RawSchema) -> ConnectorResult<()> + Send,
    {
        self.check_online().await?;
        debug!("[{}] {}", self.tag, label);
        self.calls.lock().await.push(label.clone());

        if self.faults.lock().await.failing.contains(&label) {
            return Err(ConnectorError::rejected(format!("{} refused", label)));
        }

        let result = op(&mut *self.schema.write().await);

        let calls = self.calls.lock().await.len();
        if let Some((after, token)) = &self.faults.lock().await.cancel_after {
            if calls >= *after {
                token.cancel();
            }
        }

        let pause = self.faults.lock().await.pause_after.clone();
        if let Some(pause) = pause.filter(|p| p.after == calls) {
            pause.reached.notify_one();
            pause.resume.notified().await;
        }
        result
    }
}

#[async_trait]
impl SourceConnector for MemoryConnector {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn ping(&self) -> ConnectorResult<()> {
        self.check_online().await
    }

    async fn read_schema(&self) -> ConnectorResult<RawSchema> {
        self.check_online().await?;
        {
            let mut faults = self.faults.lock().await;
            if faults.transient_reads > 0 {
                faults.transient_reads -= 1;
                return Err(ConnectorError::transient(format!(
                    "store '{}' is busy",
                    self.tag
                )));
            }
        }
        Ok(self.schema.read().await.clone())
    }
}

#[async_trait]
impl TargetConnector for MemoryConnector {
    fn supports_alter_column_type(&self) -> bool {
        self.alter_in_place
    }

    async fn read_table(&self, table: &str) -> ConnectorResult<Option<RawTable>> {
        self.check_online().await?;
        Ok(schema_ops::read_table(&*self.schema.read().await, table))
    }

    async fn read_measure(&self, name: &str) -> ConnectorResult<Option<RawMeasure>> {
        self.check_online().await?;
        Ok(schema_ops::read_measure(&*self.schema.read().await, name))
    }

    async fn read_relationship(
        &self,
        key: &RelationshipKey,
    ) -> ConnectorResult<Option<RawRelationship>> {
        self.check_online().await?;
        Ok(schema_ops::read_relationship(&*self.schema.read().await, key))
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
        let key = RelationshipKey::new(
            &relationship.from_table,
            &relationship.from_column,
            &relationship.to_table,
            &relationship.to_column,
        );
        self.write(format!("upsert_relationship {}", key), |s| {
            schema_ops::upsert_relationship(s, relationship)
        })
        .await
    }

    async fn drop_relationship(&self, key: &RelationshipKey) -> ConnectorResult<()> {
        self.write(format!("drop_relationship {}", key), |s| {
            schema_ops::drop_relationship(s, key)
        })
        .await
    }
}
