//! Change application against a target connector

pub mod applier;
pub mod report;

pub use applier::{Applier, apply};
pub use report::{ApplyReport, ApplyStatus, ChangeOutcome, FailedChange};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{MemoryConnector, SourceConnector};
    use crate::diff::{ChangeSet, DiffOptions, diff};
    use crate::model::{
        Cardinality, DataType, Dialect, RelationshipKey, SemanticColumn, SemanticMeasure,
        SemanticModel, SemanticRelationship, SemanticTable,
    };
    use crate::normalize::{normalize, to_raw};
    use tokio_util::sync::CancellationToken;

    fn sales(extra: Vec<SemanticColumn>) -> SemanticTable {
        let mut columns = vec![
            SemanticColumn::new("ORDER_ID", DataType::Int64).not_null(),
            SemanticColumn::new("PRODUCT_ID", DataType::Int64),
            SemanticColumn::new("PRICE", DataType::Decimal),
        ];
        columns.extend(extra);
        SemanticTable::new("SALES_DATA", columns)
    }

    fn products() -> SemanticTable {
        SemanticTable::new(
            "PRODUCTS",
            vec![
                SemanticColumn::new("PRODUCT_ID", DataType::Int64),
                SemanticColumn::new("NAME", DataType::String),
            ],
        )
    }

    fn live_model() -> SemanticModel {
        SemanticModel::new("Sales", "bi").with_tables(vec![sales(vec![])])
    }

    fn source_model() -> SemanticModel {
        SemanticModel::new("Sales", "warehouse")
            .with_tables(vec![
                sales(vec![SemanticColumn::new("QTY", DataType::Int64)]),
                products(),
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

    fn target_with(model: &SemanticModel) -> MemoryConnector {
        MemoryConnector::new("bi", to_raw(model, Dialect::Fabric))
    }

    async fn live(target: &MemoryConnector) -> SemanticModel {
        normalize(&target.read_schema().await.unwrap(), "bi").unwrap()
    }

    async fn pending(target: &MemoryConnector, wanted: &SemanticModel) -> ChangeSet {
        diff(&live(target).await, wanted, &DiffOptions::forward()).unwrap()
    }

    #[tokio::test]
    async fn test_apply_converges() {
        let target = target_with(&live_model());
        let source = source_model();

        let changes = pending(&target, &source).await;
        assert_eq!(changes.len(), 4);

        let report = apply(&changes, &target).await;
        assert!(report.is_clean());
        assert_eq!(report.applied_count(), 4);
        assert!(pending(&target, &source).await.is_empty());
    }

    #[tokio::test]
    async fn test_reapply_is_idempotent() {
        let target = target_with(&live_model());
        let changes = pending(&target, &source_model()).await;

        apply(&changes, &target).await;
        let calls_after_first = target.calls().await.len();

        let second = apply(&changes, &target).await;
        assert_eq!(second.skipped_count(), changes.len());
        assert_eq!(second.applied_count(), 0);
        assert_eq!(target.calls().await.len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_changes() {
        let target = target_with(&live_model());
        target.fail_on("add_column SALES_DATA.QTY").await;
        let source = source_model();

        let report = apply(&pending(&target, &source).await, &target).await;
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.applied_count(), 3);
        let failures = report.failures();
        assert_eq!(failures[0].change, "ADD column 'SALES_DATA.QTY'");

        target.clear_faults().await;
        let retry = pending(&target, &source).await;
        assert_eq!(retry.len(), 1);
        assert!(apply(&retry, &target).await.is_clean());
        assert!(pending(&target, &source).await.is_empty());
    }

    #[tokio::test]
    async fn test_type_change_in_place() {
        let target = target_with(&live_model());
        let mut wanted = live_model();
        wanted.tables[0].columns[2].data_type = DataType::Double;

        let report = apply(&pending(&target, &wanted).await, &target).await;
        assert_eq!(report.applied_count(), 1);
        assert!(report.data_loss_columns().is_empty());
        assert!(target.calls().await.contains(&"alter_column_type SALES_DATA.PRICE".to_string()));
        assert!(pending(&target, &wanted).await.is_empty());
    }

    #[tokio::test]
    async fn test_type_change_drop_and_add_reports_data_loss() {
        let target = target_with(&live_model()).without_alter_column_type();
        let mut wanted = live_model();
        wanted.tables[0].columns[2].data_type = DataType::Double;

        let report = apply(&pending(&target, &wanted).await, &target).await;
        assert_eq!(report.data_loss_columns(), vec!["SALES_DATA.PRICE".to_string()]);
        assert_eq!(
            target.calls().await,
            vec!["drop_column SALES_DATA.PRICE", "add_column SALES_DATA.PRICE"]
        );
        assert!(pending(&target, &wanted).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let target = target_with(&live_model());
        let changes = pending(&target, &source_model()).await;
        let token = CancellationToken::new();
        token.cancel();

        let report = Applier::new(&target)
            .with_cancellation(token)
            .apply(&changes)
            .await;
        assert_eq!(report.cancelled_count(), changes.len());
        assert!(target.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_removals_converge() {
        let target = target_with(&source_model());
        let wanted = live_model();

        let changes = diff(&live(&target).await, &wanted, &DiffOptions::restore()).unwrap();
        let report = apply(&changes, &target).await;
        assert!(report.is_clean());

        let after = live(&target).await;
        assert!(after.structurally_eq(&wanted));
    }

    #[tokio::test]
    async fn test_offline_target_fails_every_change() {
        let target = target_with(&live_model());
        let changes = pending(&target, &source_model()).await;
        target.set_offline(true).await;

        let report = apply(&changes, &target).await;
        assert_eq!(report.failed_count(), changes.len());
        assert!(report.failures()[0].reason.contains("offline"));
    }
}
