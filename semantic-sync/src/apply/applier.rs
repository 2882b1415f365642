//! Change applier
//!
//! Walks a change set in order against a target connector. Every change is
//! attempted on its own: a failure is recorded and the walk continues. Before
//! each change the live entity is read back and normalised, and the change
//! is skipped when the target already holds the after-value. Primitives are
//! never retried here; re-running the whole sync is the retry.

use log::{debug, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::report::{ApplyReport, ApplyStatus};
use crate::connector::{ConnectorError, TargetConnector};
use crate::diff::{
    Change, ChangeKey, ChangeSet, EntityValue, Operation, column_changed_fields, is_satisfied,
    table_changed_fields,
};
use crate::error::{SyncError, SyncResult};
use crate::model::{Dialect, SemanticColumn, SemanticTable};
use crate::normalize::{
    column_to_raw, measure_to_raw, normalize_measure, normalize_relationship, normalize_table,
    relationship_to_raw, table_to_raw,
};

/// Why a single change could not be carried out
enum StepError {
    Connector(ConnectorError),
    Invalid(String),
}

impl From<ConnectorError> for StepError {
    fn from(err: ConnectorError) -> Self {
        Self::Connector(err)
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::Connector(err) => write!(f, "{}", err),
            StepError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

type StepResult<T> = std::result::Result<T, StepError>;

pub struct Applier<'a> {
    target: &'a dyn TargetConnector,
    dialect: Dialect,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl<'a> Applier<'a> {
    pub fn new(target: &'a dyn TargetConnector) -> Self {
        Self {
            target,
            dialect: target.dialect(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Stop before the next change once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop before the next change once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    fn interrupted(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Apply every change in order; never fails as a whole
    pub async fn apply(&self, changes: &ChangeSet) -> ApplyReport {
        self.apply_with_progress(changes, |_| async {}).await
    }

    /// Like `apply`, awaiting `on_progress` with the report so far after each change
    pub async fn apply_with_progress<F, Fut>(
        &self,
        changes: &ChangeSet,
        mut on_progress: F,
    ) -> ApplyReport
    where
        F: FnMut(&ApplyReport) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut report = ApplyReport::new();
        info!(
            "Applying {} changes to '{}'",
            changes.len(),
            self.target.tag()
        );

        for change in changes {
            if self.interrupted() {
                debug!("Cancelled before {}", change);
                report.record(change, ApplyStatus::Cancelled);
                continue;
            }

            let status = match self.apply_one(change).await {
                Ok(status) => {
                    debug!("{} -> {}", change, status.label());
                    status
                }
                Err(err) => {
                    warn!("{}", err);
                    ApplyStatus::from_error(err)
                }
            };
            report.record(change, status);
            on_progress(&report).await;
        }

        info!(
            "Apply finished: {} applied, {} already satisfied, {} failed, {} cancelled",
            report.applied_count(),
            report.skipped_count(),
            report.failed_count(),
            report.cancelled_count()
        );
        report
    }

    /// Carry out one change; `Err` is always `SyncError::Apply`
    async fn apply_one(&self, change: &Change) -> SyncResult<ApplyStatus> {
        let failed = |reason: String| SyncError::Apply {
            change: change.to_string(),
            reason,
        };

        let live = self
            .read_live(&change.key)
            .await
            .map_err(|e| failed(format!("cannot read live state: {}", e)))?;

        if is_satisfied(change, live.as_ref()) {
            return Ok(ApplyStatus::AlreadySatisfied);
        }

        let data_loss = self
            .execute(change, live.as_ref())
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(ApplyStatus::Applied { data_loss })
    }

    /// Current value of the entity addressed by `key`, normalised
    async fn read_live(&self, key: &ChangeKey) -> StepResult<Option<EntityValue>> {
        let invalid = |e: SyncError| StepError::Invalid(e.to_string());

        match key {
            ChangeKey::Table { table } => match self.target.read_table(table).await? {
                Some(raw) => Ok(Some(EntityValue::Table(
                    normalize_table(&raw, self.dialect).map_err(invalid)?,
                ))),
                None => Ok(None),
            },
            ChangeKey::Column { table, column } => match self.target.read_table(table).await? {
                Some(raw) => {
                    let table = normalize_table(&raw, self.dialect).map_err(invalid)?;
                    Ok(table.column(column).cloned().map(EntityValue::Column))
                }
                None => Ok(None),
            },
            ChangeKey::Measure { name } => match self.target.read_measure(name).await? {
                Some(raw) => Ok(Some(EntityValue::Measure(
                    normalize_measure(&raw).map_err(invalid)?,
                ))),
                None => Ok(None),
            },
            ChangeKey::Relationship(key) => match self.target.read_relationship(key).await? {
                Some(raw) => Ok(Some(EntityValue::Relationship(
                    normalize_relationship(&raw).map_err(invalid)?,
                ))),
                None => Ok(None),
            },
        }
    }

    /// Run the primitives for one change; returns whether column data was lost
    async fn execute(&self, change: &Change, live: Option<&EntityValue>) -> StepResult<bool> {
        if change.operation == Operation::Remove {
            self.remove(&change.key).await?;
            return Ok(false);
        }

        let after = change
            .after
            .as_ref()
            .ok_or_else(|| StepError::Invalid(format!("{} has no after-value", change)))?;

        match (after, live) {
            (EntityValue::Table(wanted), None) => {
                self.target
                    .create_table(&table_to_raw(wanted, self.dialect))
                    .await?;
                Ok(false)
            }
            (EntityValue::Table(wanted), Some(EntityValue::Table(current))) => {
                self.reconcile_table(current, wanted, change.operation == Operation::Add)
                    .await
            }
            (EntityValue::Column(wanted), None) => {
                let table = change.key.table().unwrap_or_default();
                self.target
                    .add_column(table, &column_to_raw(wanted, self.dialect))
                    .await?;
                Ok(false)
            }
            (EntityValue::Column(wanted), Some(EntityValue::Column(current))) => {
                let table = change.key.table().unwrap_or_default();
                self.modify_column(table, current, wanted).await
            }
            (EntityValue::Measure(wanted), _) => {
                self.target.upsert_measure(&measure_to_raw(wanted)).await?;
                Ok(false)
            }
            (EntityValue::Relationship(wanted), _) => {
                self.target
                    .upsert_relationship(&relationship_to_raw(wanted))
                    .await?;
                Ok(false)
            }
            _ => Err(StepError::Invalid(format!(
                "live entity for {} has the wrong kind",
                change
            ))),
        }
    }

    async fn remove(&self, key: &ChangeKey) -> StepResult<()> {
        match key {
            ChangeKey::Table { table } => self.target.drop_table(table).await?,
            ChangeKey::Column { table, column } => self.target.drop_column(table, column).await?,
            ChangeKey::Measure { name } => self.target.drop_measure(name).await?,
            ChangeKey::Relationship(key) => self.target.drop_relationship(key).await?,
        }
        Ok(())
    }

    /// Bring an existing table to `wanted`; columns only when `with_columns`
    async fn reconcile_table(
        &self,
        current: &SemanticTable,
        wanted: &SemanticTable,
        with_columns: bool,
    ) -> StepResult<bool> {
        if !table_changed_fields(current, wanted).is_empty() {
            let description = Some(wanted.description.as_str()).filter(|d| !d.is_empty());
            self.target
                .set_table_metadata(&current.name, description, wanted.hidden)
                .await?;
        }

        let mut data_loss = false;
        if with_columns {
            // A previous run created the table but stopped part way through
            for column in &wanted.columns {
                match current.column(&column.name) {
                    None => {
                        self.target
                            .add_column(&current.name, &column_to_raw(column, self.dialect))
                            .await?
                    }
                    Some(existing) => {
                        data_loss |= self.modify_column(&current.name, existing, column).await?
                    }
                }
            }
        }
        Ok(data_loss)
    }

    async fn modify_column(
        &self,
        table: &str,
        current: &SemanticColumn,
        wanted: &SemanticColumn,
    ) -> StepResult<bool> {
        let fields = column_changed_fields(current, wanted);
        if fields.is_empty() {
            return Ok(false);
        }

        let raw = column_to_raw(wanted, self.dialect);
        if !fields.contains(&"data_type") {
            self.target.update_column(table, &raw).await?;
            return Ok(false);
        }

        if self.target.supports_alter_column_type() {
            debug!(
                "Altering {}.{} from {} to {} in place",
                table, current.name, current.data_type, wanted.data_type
            );
            self.target
                .alter_column_type(table, &current.name, &raw.data_type)
                .await?;
            if fields.len() > 1 {
                self.target.update_column(table, &raw).await?;
            }
            return Ok(false);
        }

        warn!(
            "Target '{}' cannot alter {}.{} from {} to {} in place; dropping and re-adding the column, existing data in it is lost",
            self.target.tag(),
            table,
            current.name,
            current.data_type,
            wanted.data_type
        );
        self.target.drop_column(table, &current.name).await?;
        self.target.add_column(table, &raw).await?;
        Ok(true)
    }
}

/// Apply `changes` to `target` without cancellation
pub async fn apply(changes: &ChangeSet, target: &dyn TargetConnector) -> ApplyReport {
    Applier::new(target).apply(changes).await
}
