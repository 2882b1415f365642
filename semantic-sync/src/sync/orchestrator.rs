//! Sync orchestrator
//!
//! Drives one run through VALIDATING, EXTRACTING, DIFFING and APPLYING. The
//! audit record is written on every exit path once the run lock is held.

use futures::try_join;
use log::{debug, error, info, warn};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::lock::RunLocks;
use super::run::SyncRun;
use super::state::SyncState;
use crate::apply::{ApplyReport, Applier};
use crate::connector::{SourceConnector, TargetConnector};
use crate::diff::{ChangeSet, DiffOptions, SyncMode, diff};
use crate::error::{SyncError, SyncResult};
use crate::model::SemanticModel;
use crate::normalize::normalize;
use crate::repository::sync_runs;
use crate::resilience::RetryPolicy;
use crate::snapshot::SnapshotStore;

/// Parameters of a single sync run
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Stop after DIFFING
    pub dry_run: bool,
    pub mode: SyncMode,
    pub case_insensitive: bool,
    pub ignore_hidden: bool,
    /// Capture the target's live model before APPLYING
    pub snapshot_before_apply: bool,
    /// Checked between phases and between changes
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            dry_run: false,
            mode: SyncMode::Incremental,
            case_insensitive: true,
            ignore_hidden: false,
            snapshot_before_apply: true,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl SyncRequest {
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn ignore_hidden(mut self, ignore_hidden: bool) -> Self {
        self.ignore_hidden = ignore_hidden;
        self
    }

    pub fn snapshot_before_apply(mut self, snapshot: bool) -> Self {
        self.snapshot_before_apply = snapshot;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Forward-sync detector options; removals stay disabled
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions::forward()
            .case_insensitive(self.case_insensitive)
            .ignore_hidden(self.ignore_hidden)
            .mode(self.mode)
    }

    fn interrupted(&self, deadline: Option<Instant>) -> bool {
        self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Finished run with the change set it worked on
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub run: SyncRun,
    pub changes: ChangeSet,
    /// Absent for dry runs
    pub report: Option<ApplyReport>,
}

impl SyncOutcome {
    pub fn exit_code(&self) -> i32 {
        self.run.exit_code()
    }
}

pub struct SyncOrchestrator {
    snapshots: Arc<SnapshotStore>,
    locks: RunLocks,
    retry: RetryPolicy,
}

impl SyncOrchestrator {
    pub fn new(snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            snapshots,
            locks: RunLocks::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share run locks with other orchestrators in this process
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &RunLocks {
        &self.locks
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    fn pool(&self) -> &SqlitePool {
        self.snapshots.pool()
    }

    /// Bring `target` in line with `source`
    ///
    /// Fatal errors come back as `Err` after the FAILED record is written. A
    /// run lock already held for the pair is rejected before any record exists.
    pub async fn sync(
        &self,
        source: &dyn SourceConnector,
        target: &dyn TargetConnector,
        request: SyncRequest,
    ) -> SyncResult<SyncOutcome> {
        let _guard = self.locks.try_acquire(source.tag(), target.tag())?;

        let mut run = SyncRun::new(source.tag(), target.tag(), request.mode, request.dry_run);
        if let Err(e) = sync_runs::insert_run(self.pool(), &run).await {
            warn!("Could not record start of sync run {}: {:#}", run.id, e);
        }
        info!(
            "Sync run {} started: '{}' -> '{}'{}",
            run.id,
            run.source_tag,
            run.target_tag,
            if request.dry_run { " (dry run)" } else { "" }
        );

        let deadline = request.timeout.map(|t| Instant::now() + t);
        match self
            .drive(&mut run, source, target, &request, deadline)
            .await
        {
            Ok((changes, report)) => {
                self.record(&run).await;
                Ok(SyncOutcome {
                    run,
                    changes,
                    report,
                })
            }
            Err(err) => {
                let state = run.state;
                if let Err(e) = run.fail(&err) {
                    warn!("Sync run {} could not be marked failed: {}", run.id, e);
                }
                error!("Sync run {} FAILED during {}: {}", run.id, state, err);
                self.record(&run).await;
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        run: &mut SyncRun,
        source: &dyn SourceConnector,
        target: &dyn TargetConnector,
        request: &SyncRequest,
        deadline: Option<Instant>,
    ) -> SyncResult<(ChangeSet, Option<ApplyReport>)> {
        self.advance(run, SyncState::Validating).await?;
        try_join!(ping(source), ping(target))?;
        check_interrupt(run, request, deadline)?;

        self.advance(run, SyncState::Extracting).await?;
        let (wanted, live) = try_join!(self.extract(source), self.extract(target))?;
        check_interrupt(run, request, deadline)?;

        self.advance(run, SyncState::Diffing).await?;
        let changes = diff(&live, &wanted, &request.diff_options())?;
        run.record_changes(&changes);

        if request.dry_run {
            run.transition(SyncState::Completed)?;
            return Ok((changes, None));
        }
        check_interrupt(run, request, deadline)?;

        if request.snapshot_before_apply && !changes.is_empty() {
            let description = format!("pre-sync {}", run.id);
            let snapshot = self
                .snapshots
                .capture(&live, target.tag(), &description)
                .await?;
            run.snapshot_id = Some(snapshot.meta.id);
        }

        self.advance(run, SyncState::Applying).await?;
        let pool = self.pool().clone();
        let applying = run.clone();
        let report = Applier::new(target)
            .with_cancellation(request.cancel.clone())
            .with_deadline(deadline)
            .apply_with_progress(&changes, |report| {
                let mut progress = applying.clone();
                progress.record_report(report);
                let pool = pool.clone();
                async move {
                    if let Err(e) = sync_runs::update_run(&pool, &progress).await {
                        debug!("Progress of sync run {} not stored: {:#}", progress.id, e);
                    }
                }
            })
            .await;
        run.finish(&report)?;

        Ok((changes, Some(report)))
    }

    /// Extract both sides and diff them without starting a run
    pub async fn preview(
        &self,
        source: &dyn SourceConnector,
        target: &dyn TargetConnector,
        request: &SyncRequest,
    ) -> SyncResult<ChangeSet> {
        let (wanted, live) = try_join!(self.extract(source), self.extract(target))?;
        diff(&live, &wanted, &request.diff_options())
    }

    async fn advance(&self, run: &mut SyncRun, next: SyncState) -> SyncResult<()> {
        run.transition(next)?;
        if let Err(e) = sync_runs::update_run(self.pool(), run).await {
            debug!("Progress of sync run {} not stored: {:#}", run.id, e);
        }
        Ok(())
    }

    async fn extract<C>(&self, side: &C) -> SyncResult<SemanticModel>
    where
        C: SourceConnector + ?Sized,
    {
        let label = format!("read_schema [{}]", side.tag());
        let raw = self
            .retry
            .execute(&label, || side.read_schema())
            .await
            .map_err(|e| SyncError::from_connector(side.tag(), e))?;

        let model = normalize(&raw, side.tag())?;
        debug!(
            "Extracted '{}' from '{}': {} tables, {} measures, {} relationships",
            model.name,
            side.tag(),
            model.table_count(),
            model.measure_count(),
            model.relationship_count()
        );
        Ok(model)
    }

    async fn record(&self, run: &SyncRun) {
        if let Err(e) = sync_runs::finalize_run(self.pool(), run).await {
            error!("Could not write audit record of sync run {}: {:#}", run.id, e);
        }
    }

    /// Sync runs, newest first
    pub async fn history(&self, limit: Option<usize>) -> SyncResult<Vec<SyncRun>> {
        sync_runs::list_runs(self.pool(), limit)
            .await
            .map_err(SyncError::storage)
    }

    pub async fn run(&self, id: &Uuid) -> SyncResult<Option<SyncRun>> {
        sync_runs::get_run(self.pool(), id)
            .await
            .map_err(SyncError::storage)
    }

    /// Keep the `keep_n` most recent finished runs
    pub async fn cleanup_history(&self, keep_n: usize) -> SyncResult<u64> {
        let removed = sync_runs::cleanup_runs(self.pool(), keep_n)
            .await
            .map_err(SyncError::storage)?;
        info!("Sync history cleanup removed {} runs", removed);
        Ok(removed)
    }
}

async fn ping<C>(side: &C) -> SyncResult<()>
where
    C: SourceConnector + ?Sized,
{
    side.ping()
        .await
        .map_err(|e| SyncError::from_connector(side.tag(), e))
}

fn check_interrupt(
    run: &SyncRun,
    request: &SyncRequest,
    deadline: Option<Instant>,
) -> SyncResult<()> {
    if request.interrupted(deadline) {
        return Err(SyncError::Cancelled {
            state: run.state.label().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MemoryConnector;
    use crate::model::{
        Cardinality, DataType, Dialect, RelationshipKey, SemanticColumn, SemanticMeasure,
        SemanticRelationship, SemanticTable,
    };
    use crate::normalize::{RawColumn, to_raw};
    use crate::resilience::RetryConfig;

    fn sales(extra: Vec<SemanticColumn>) -> SemanticTable {
        let mut columns = vec![
            SemanticColumn::new("ORDER_ID", DataType::Int64).not_null(),
            SemanticColumn::new("PRODUCT_ID", DataType::Int64),
            SemanticColumn::new("PRICE", DataType::Decimal),
        ];
        columns.extend(extra);
        SemanticTable::new("SALES_DATA", columns)
    }

    fn warehouse_model() -> SemanticModel {
        SemanticModel::new("Sales", "warehouse")
            .with_tables(vec![
                sales(vec![SemanticColumn::new("QTY", DataType::Int64)]),
                SemanticTable::new(
                    "PRODUCTS",
                    vec![
                        SemanticColumn::new("PRODUCT_ID", DataType::Int64),
                        SemanticColumn::new("NAME", DataType::String),
                    ],
                ),
            ])
            .with_measures(vec![SemanticMeasure::new(
                "Revenue",
                "SALES_DATA",
                "SUM(SALES_DATA[PRICE])",
            )])
            .with_relationships(vec![SemanticRelationship::new(
                RelationshipKey::new("SALES_DATA", "PRODUCT_ID", "PRODUCTS", "PRODUCT_ID"),
                Cardinality::ManyToOne,
            )])
    }

    fn bi_model() -> SemanticModel {
        SemanticModel::new("Sales", "bi").with_tables(vec![sales(vec![])])
    }

    fn source() -> MemoryConnector {
        MemoryConnector::new("warehouse", to_raw(&warehouse_model(), Dialect::Snowflake))
    }

    fn target() -> MemoryConnector {
        MemoryConnector::new("bi", to_raw(&bi_model(), Dialect::Fabric))
    }

    async fn orchestrator() -> SyncOrchestrator {
        let store = SnapshotStore::in_memory().await.unwrap();
        SyncOrchestrator::new(Arc::new(store))
            .with_retry(RetryPolicy::new(RetryConfig::aggressive()))
    }

    async fn live(target: &MemoryConnector) -> SemanticModel {
        normalize(&target.read_schema().await.unwrap(), "bi").unwrap()
    }

    #[tokio::test]
    async fn test_sync_completes_and_converges() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();

        assert_eq!(outcome.run.state, SyncState::Completed);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.changes.len(), 4);
        assert_eq!(outcome.run.changes_applied, 4);
        assert!(live(&target).await.structurally_eq(&warehouse_model()));

        let history = orchestrator.history(None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, SyncState::Completed);
        assert_eq!(history[0].changes_detected, 4);

        let snapshot_id = history[0].snapshot_id.unwrap();
        let before = orchestrator.snapshots().load(&snapshot_id).await.unwrap();
        assert!(before.structurally_eq(&bi_model()));
        assert!(!orchestrator.locks().is_held("warehouse", "bi"));
    }

    #[tokio::test]
    async fn test_second_sync_has_nothing_to_do() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.run.state, SyncState::Completed);
        assert!(outcome.run.snapshot_id.is_none());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_target_untouched() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        let before = target.schema().await;

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default().dry_run(true))
            .await
            .unwrap();

        assert_eq!(outcome.run.state, SyncState::Completed);
        assert!(outcome.run.dry_run);
        assert!(outcome.report.is_none());
        assert_eq!(outcome.changes.len(), 4);
        assert!(target.calls().await.is_empty());
        assert_eq!(target.schema().await, before);
        assert!(orchestrator.snapshots().list(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_change_gives_partial_run() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        target.fail_on("add_column SALES_DATA.QTY").await;

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();

        assert_eq!(outcome.run.state, SyncState::Partial);
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.run.changes_applied, 3);
        assert_eq!(outcome.run.failures.len(), 1);
        assert!(outcome.run.failures[0].change.contains("SALES_DATA.QTY"));

        let stored = orchestrator.run(&outcome.run.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SyncState::Partial);
        assert_eq!(stored.failures, outcome.run.failures);
    }

    #[tokio::test]
    async fn test_every_change_failing_gives_failed_run() {
        let orchestrator = orchestrator().await;
        let source = MemoryConnector::new(
            "warehouse",
            to_raw(
                &SemanticModel::new("Sales", "warehouse")
                    .with_tables(vec![sales(vec![SemanticColumn::new("QTY", DataType::Int64)])]),
                Dialect::Snowflake,
            ),
        );
        let target = target();
        target.fail_on("add_column SALES_DATA.QTY").await;

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();

        assert_eq!(outcome.run.state, SyncState::Failed);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.run.error_state, Some(SyncState::Applying));
    }

    #[tokio::test]
    async fn test_unreachable_source_fails_in_validating() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        source.set_offline(true).await;

        let err = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
        assert!(err.to_string().contains("warehouse"));

        let history = orchestrator.history(None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, SyncState::Failed);
        assert_eq!(history[0].error_state, Some(SyncState::Validating));
        assert!(
            history[0]
                .error_summary
                .as_deref()
                .unwrap()
                .starts_with("ConnectionError")
        );
        assert!(!orchestrator.locks().is_held("warehouse", "bi"));
    }

    #[tokio::test]
    async fn test_unknown_native_type_fails_in_extracting() {
        let orchestrator = orchestrator().await;
        let mut raw = to_raw(&warehouse_model(), Dialect::Snowflake);
        raw.tables[0].columns.push(RawColumn {
            name: "REGION".to_string(),
            data_type: "GEOGRAPHY".to_string(),
            is_nullable: None,
            description: None,
            is_hidden: false,
        });
        let source = MemoryConnector::new("warehouse", raw);
        let target = target();

        let err = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaReadError");
        assert!(err.to_string().contains("REGION"));

        let history = orchestrator.history(None).await.unwrap();
        assert_eq!(history[0].error_state, Some(SyncState::Extracting));
        assert!(target.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_held_lock_rejects_without_record() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        let _guard = orchestrator.locks().try_acquire("warehouse", "bi").unwrap();

        let err = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(orchestrator.history(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_reads_are_retried() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        source.fail_next_reads(2).await;

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();
        assert_eq!(outcome.run.state, SyncState::Completed);
    }

    #[tokio::test]
    async fn test_cancellation_mid_apply_is_partial() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        let token = CancellationToken::new();
        target.cancel_after_writes(1, token.clone()).await;

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default().cancel(token))
            .await
            .unwrap();

        assert_eq!(outcome.run.state, SyncState::Partial);
        assert_eq!(outcome.run.changes_applied, 1);
        assert_eq!(outcome.run.changes_cancelled, 3);
        assert_eq!(target.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_stored_during_apply() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        let pause = target.pause_after_writes(2).await;

        let (outcome, stored) = tokio::join!(
            orchestrator.sync(&source, &target, SyncRequest::default()),
            async {
                pause.reached.notified().await;
                let history = orchestrator.history(None).await.unwrap();
                pause.resume.notify_one();
                history
            }
        );

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].state, SyncState::Applying);
        assert_eq!(stored[0].changes_detected, 4);
        assert_eq!(stored[0].changes_applied, 1);

        let outcome = outcome.unwrap();
        assert_eq!(outcome.run.state, SyncState::Completed);
        let history = orchestrator.history(None).await.unwrap();
        assert_eq!(history[0].state, SyncState::Completed);
        assert_eq!(history[0].changes_applied, 4);
    }

    #[tokio::test]
    async fn test_case_insensitive_sync_converges() {
        let orchestrator = orchestrator().await;
        let live_model = SemanticModel::new("Sales", "bi").with_tables(vec![
            SemanticTable::new(
                "SALES",
                vec![
                    SemanticColumn::new("ID", DataType::Int64),
                    SemanticColumn::new("PID", DataType::Int64),
                ],
            ),
            SemanticTable::new("PRODUCTS", vec![SemanticColumn::new("PID", DataType::Int64)]),
        ]);
        let wanted = SemanticModel::new("Sales", "warehouse")
            .with_tables(vec![
                SemanticTable::new(
                    "sales",
                    vec![
                        SemanticColumn::new("id", DataType::Int64),
                        SemanticColumn::new("pid", DataType::Int64),
                    ],
                ),
                SemanticTable::new("products", vec![SemanticColumn::new("pid", DataType::Int64)]),
            ])
            .with_measures(vec![SemanticMeasure::new("Rev", "sales", "COUNT(sales[id])")])
            .with_relationships(vec![SemanticRelationship::new(
                RelationshipKey::new("sales", "pid", "products", "pid"),
                Cardinality::ManyToOne,
            )]);
        let source = MemoryConnector::new("warehouse", to_raw(&wanted, Dialect::Snowflake));
        let target = MemoryConnector::new("bi", to_raw(&live_model, Dialect::Fabric));

        let outcome = orchestrator
            .sync(&source, &target, SyncRequest::default())
            .await
            .unwrap();
        assert_eq!(outcome.run.state, SyncState::Completed);
        assert_eq!(outcome.run.changes_applied, 2);

        let after = live(&target).await;
        assert_eq!(after.measure("Rev").unwrap().table, "SALES");
        assert!(
            after
                .relationship(&RelationshipKey::new("SALES", "PID", "PRODUCTS", "PID"))
                .is_some()
        );

        let again = orchestrator
            .preview(&source, &target, &SyncRequest::default())
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_apply_fails() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        let token = CancellationToken::new();
        token.cancel();

        let err = orchestrator
            .sync(&source, &target, SyncRequest::default().cancel(token))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Cancelled");

        let history = orchestrator.history(None).await.unwrap();
        assert_eq!(history[0].state, SyncState::Failed);
        assert_eq!(history[0].error_state, Some(SyncState::Validating));
        assert!(target.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_only_mode_skips_structure() {
        let orchestrator = orchestrator().await;
        let mut wanted = bi_model();
        wanted.tables[0] = sales(vec![SemanticColumn::new("QTY", DataType::Int64)])
            .with_description("Order lines");
        let source =
            MemoryConnector::new("warehouse", to_raw(&wanted, Dialect::Snowflake));
        let target = target();

        let request = SyncRequest::default()
            .mode(SyncMode::MetadataOnly)
            .snapshot_before_apply(false);
        let outcome = orchestrator.sync(&source, &target, request).await.unwrap();

        let changes: Vec<String> = outcome.changes.iter().map(|c| c.to_string()).collect();
        assert_eq!(changes, vec!["MODIFY table 'SALES_DATA' (description)"]);
        let after = live(&target).await;
        assert_eq!(after.table("SALES_DATA").unwrap().description, "Order lines");
        assert!(after.table("SALES_DATA").unwrap().column("QTY").is_none());
    }

    #[tokio::test]
    async fn test_preview_does_not_record() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());

        let changes = orchestrator
            .preview(&source, &target, &SyncRequest::default())
            .await
            .unwrap();
        assert_eq!(changes.len(), 4);
        assert!(orchestrator.history(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_history() {
        let orchestrator = orchestrator().await;
        let (source, target) = (source(), target());
        for _ in 0..3 {
            orchestrator
                .sync(&source, &target, SyncRequest::default().dry_run(true))
                .await
                .unwrap();
        }

        assert_eq!(orchestrator.cleanup_history(1).await.unwrap(), 2);
        assert_eq!(orchestrator.history(None).await.unwrap().len(), 1);
    }
}
