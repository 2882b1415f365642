//! Change detector
//!
//! Matches entities by natural key and emits the changes that turn `base`
//! into `target`. REMOVEs are only produced when `allow_remove` is set; the
//! forward sync path leaves target-only objects alone, the restore path
//! enables removal because a snapshot is an explicit intent to revert.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::change::{Change, ChangeKey, ChangeSet, EntityValue, Operation};
use crate::error::{SyncError, SyncResult};
use crate::model::{
    RelationshipKey, SemanticColumn, SemanticMeasure, SemanticModel, SemanticRelationship,
    SemanticTable,
};

/// Which changes a forward sync is allowed to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Additions and modifications
    #[default]
    Incremental,
    /// Only modifications of presentation attributes
    MetadataOnly,
}

impl SyncMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::MetadataOnly => "metadata-only",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "metadata-only" | "metadata_only" | "metadata" => Ok(Self::MetadataOnly),
            other => Err(format!("unknown sync mode '{}'", other)),
        }
    }
}

/// Detector behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Emit REMOVE for entities missing from `target`
    pub allow_remove: bool,
    /// Match names ignoring ASCII case; live (base) spellings are kept
    pub case_insensitive: bool,
    /// Leave hidden tables, columns and measures out of the comparison
    pub ignore_hidden: bool,
    pub mode: SyncMode,
}

impl DiffOptions {
    /// Options for source -> target sync: never destructive of target-only state
    pub fn forward() -> Self {
        Self {
            allow_remove: false,
            case_insensitive: false,
            ignore_hidden: false,
            mode: SyncMode::Incremental,
        }
    }

    /// Options for snapshot restore
    pub fn restore() -> Self {
        Self {
            allow_remove: true,
            ..Self::forward()
        }
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn ignore_hidden(mut self, enabled: bool) -> Self {
        self.ignore_hidden = enabled;
        self
    }

    pub fn mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    fn fold(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    fn same_name(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    fn fold_relationship(&self, key: &RelationshipKey) -> RelationshipKey {
        RelationshipKey::new(
            &self.fold(&key.from_table),
            &self.fold(&key.from_column),
            &self.fold(&key.to_table),
            &self.fold(&key.to_column),
        )
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self::forward()
    }
}

/// Compute the ordered change set that turns `base` into `target`
pub fn diff(
    base: &SemanticModel,
    target: &SemanticModel,
    options: &DiffOptions,
) -> SyncResult<ChangeSet> {
    debug!(
        "Diffing '{}' (v{}) against '{}' (v{})",
        base.name, base.version, target.name, target.version
    );

    let names = LiveNames::new(base, options);
    let mut changes = Vec::new();
    diff_tables(base, target, options, &mut changes)?;
    diff_measures(base, target, options, &names, &mut changes)?;
    diff_relationships(base, target, options, &names, &mut changes)?;

    if options.mode == SyncMode::MetadataOnly {
        changes.retain(Change::is_cosmetic);
    }

    let set = ChangeSet::new(changes)?;
    let summary = set.summary();
    info!(
        "Change detection complete: {} additions, {} modifications, {} removals ({} destructive)",
        summary.added, summary.modified, summary.removed, summary.destructive
    );
    Ok(set)
}

/// Differing attributes of two tables (columns are diffed separately)
pub fn table_changed_fields(before: &SemanticTable, after: &SemanticTable) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if before.description != after.description {
        fields.push("description");
    }
    if before.hidden != after.hidden {
        fields.push("hidden");
    }
    fields
}

pub fn column_changed_fields(before: &SemanticColumn, after: &SemanticColumn) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if before.data_type != after.data_type {
        fields.push("data_type");
    }
    if before.nullable != after.nullable {
        fields.push("nullable");
    }
    if before.description != after.description {
        fields.push("description");
    }
    if before.hidden != after.hidden {
        fields.push("hidden");
    }
    fields
}

pub fn measure_changed_fields(
    before: &SemanticMeasure,
    after: &SemanticMeasure,
) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if before.table != after.table {
        fields.push("table");
    }
    if before.expression != after.expression {
        fields.push("expression");
    }
    if before.description != after.description {
        fields.push("description");
    }
    if before.format_string != after.format_string {
        fields.push("format_string");
    }
    if before.folder != after.folder {
        fields.push("folder");
    }
    if before.hidden != after.hidden {
        fields.push("hidden");
    }
    fields
}

pub fn relationship_changed_fields(
    before: &SemanticRelationship,
    after: &SemanticRelationship,
) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if before.cardinality != after.cardinality {
        fields.push("cardinality");
    }
    if before.cross_filter != after.cross_filter {
        fields.push("cross_filter");
    }
    if before.active != after.active {
        fields.push("active");
    }
    fields
}

/// Live spellings of tables and columns, looked up by folded name
///
/// Measures and relationships point at tables and columns by name; when
/// matching ignores case those references must be rewritten to the names
/// the target actually holds.
struct LiveNames {
    options: DiffOptions,
    tables: BTreeMap<String, String>,
    columns: BTreeMap<(String, String), String>,
}

impl LiveNames {
    fn new(base: &SemanticModel, options: &DiffOptions) -> Self {
        let mut tables = BTreeMap::new();
        let mut columns = BTreeMap::new();
        if options.case_insensitive {
            for table in &base.tables {
                let folded = options.fold(&table.name);
                for column in &table.columns {
                    columns.insert(
                        (folded.clone(), options.fold(&column.name)),
                        column.name.clone(),
                    );
                }
                tables.insert(folded, table.name.clone());
            }
        }
        Self {
            options: *options,
            tables,
            columns,
        }
    }

    fn table(&self, name: &str) -> String {
        self.tables
            .get(&self.options.fold(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn column(&self, table: &str, column: &str) -> String {
        self.columns
            .get(&(self.options.fold(table), self.options.fold(column)))
            .cloned()
            .unwrap_or_else(|| column.to_string())
    }

    fn relationship(&self, key: &RelationshipKey) -> RelationshipKey {
        RelationshipKey::new(
            &self.table(&key.from_table),
            &self.column(&key.from_table, &key.from_column),
            &self.table(&key.to_table),
            &self.column(&key.to_table, &key.to_column),
        )
    }
}

/// Build a folded-name index, refusing names that collide after folding
fn index_by<'a, T, K: Ord>(
    items: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> K,
    label: impl Fn(&T) -> String,
) -> SyncResult<BTreeMap<K, &'a T>>
where
    T: 'a,
{
    let mut map = BTreeMap::new();
    for item in items {
        if map.insert(key(item), item).is_some() {
            return Err(SyncError::DiffConflict { key: label(item) });
        }
    }
    Ok(map)
}

fn visible_columns<'a>(table: &'a SemanticTable, options: &DiffOptions) -> Vec<&'a SemanticColumn> {
    table
        .columns
        .iter()
        .filter(|c| !(options.ignore_hidden && c.hidden))
        .collect()
}

/// Table as it should be created: hidden columns dropped when they are ignored
fn visible_table(table: &SemanticTable, options: &DiffOptions) -> SemanticTable {
    let mut table = table.clone();
    if options.ignore_hidden {
        table.columns.retain(|c| !c.hidden);
    }
    table
}

fn diff_tables(
    base: &SemanticModel,
    target: &SemanticModel,
    options: &DiffOptions,
    changes: &mut Vec<Change>,
) -> SyncResult<()> {
    let visible = |t: &&SemanticTable| !(options.ignore_hidden && t.hidden);
    let label = |t: &SemanticTable| format!("table '{}'", t.name);

    let base_tables = index_by(base.tables.iter().filter(visible), |t| options.fold(&t.name), label)?;
    let target_tables =
        index_by(target.tables.iter().filter(visible), |t| options.fold(&t.name), label)?;

    for (key, wanted) in &target_tables {
        match base_tables.get(key) {
            None => changes.push(Change::add(
                ChangeKey::Table {
                    table: wanted.name.clone(),
                },
                EntityValue::Table(visible_table(wanted, options)),
            )),
            Some(live) => {
                // Keep the live spelling so the applier addresses the existing object
                let mut after = visible_table(wanted, options);
                after.name = live.name.clone();

                let fields = table_changed_fields(live, &after);
                if !fields.is_empty() {
                    changes.push(Change::modify(
                        ChangeKey::Table {
                            table: live.name.clone(),
                        },
                        EntityValue::Table(visible_table(live, options)),
                        EntityValue::Table(after),
                        fields,
                    ));
                }
                diff_columns(live, wanted, options, changes)?;
            }
        }
    }

    if options.allow_remove {
        for (key, live) in &base_tables {
            if !target_tables.contains_key(key) {
                changes.push(Change::remove(
                    ChangeKey::Table {
                        table: live.name.clone(),
                    },
                    EntityValue::Table(visible_table(live, options)),
                ));
            }
        }
    }

    Ok(())
}

fn diff_columns(
    live: &SemanticTable,
    wanted: &SemanticTable,
    options: &DiffOptions,
    changes: &mut Vec<Change>,
) -> SyncResult<()> {
    let label = |c: &SemanticColumn| format!("column '{}.{}'", live.name, c.name);
    let base_cols = index_by(
        visible_columns(live, options).into_iter(),
        |c| options.fold(&c.name),
        label,
    )?;
    let target_cols = index_by(
        visible_columns(wanted, options).into_iter(),
        |c| options.fold(&c.name),
        label,
    )?;

    let column_key = |column: &str| ChangeKey::Column {
        table: live.name.clone(),
        column: column.to_string(),
    };

    for (key, wanted_col) in &target_cols {
        match base_cols.get(key) {
            None => changes.push(Change::add(
                column_key(&wanted_col.name),
                EntityValue::Column((*wanted_col).clone()),
            )),
            Some(live_col) => {
                let mut after = (*wanted_col).clone();
                after.name = live_col.name.clone();

                let fields = column_changed_fields(live_col, &after);
                if !fields.is_empty() {
                    changes.push(Change::modify(
                        column_key(&live_col.name),
                        EntityValue::Column((*live_col).clone()),
                        EntityValue::Column(after),
                        fields,
                    ));
                }
            }
        }
    }

    if options.allow_remove {
        for (key, live_col) in &base_cols {
            if !target_cols.contains_key(key) {
                changes.push(Change::remove(
                    column_key(&live_col.name),
                    EntityValue::Column((*live_col).clone()),
                ));
            }
        }
    }

    Ok(())
}

fn diff_measures(
    base: &SemanticModel,
    target: &SemanticModel,
    options: &DiffOptions,
    names: &LiveNames,
    changes: &mut Vec<Change>,
) -> SyncResult<()> {
    let visible = |m: &&SemanticMeasure| !(options.ignore_hidden && m.hidden);
    let label = |m: &SemanticMeasure| format!("measure '{}'", m.name);

    let base_measures =
        index_by(base.measures.iter().filter(visible), |m| options.fold(&m.name), label)?;
    let target_measures =
        index_by(target.measures.iter().filter(visible), |m| options.fold(&m.name), label)?;

    for (key, wanted) in &target_measures {
        match base_measures.get(key) {
            None => {
                let mut added = (*wanted).clone();
                added.table = names.table(&wanted.table);
                changes.push(Change::add(
                    ChangeKey::Measure {
                        name: wanted.name.clone(),
                    },
                    EntityValue::Measure(added),
                ))
            }
            Some(live) => {
                let mut after = (*wanted).clone();
                after.name = live.name.clone();
                after.table = if options.same_name(&live.table, &after.table) {
                    live.table.clone()
                } else {
                    names.table(&after.table)
                };

                let fields = measure_changed_fields(live, &after);
                if !fields.is_empty() {
                    changes.push(Change::modify(
                        ChangeKey::Measure {
                            name: live.name.clone(),
                        },
                        EntityValue::Measure((*live).clone()),
                        EntityValue::Measure(after),
                        fields,
                    ));
                }
            }
        }
    }

    if options.allow_remove {
        for (key, live) in &base_measures {
            if !target_measures.contains_key(key) {
                changes.push(Change::remove(
                    ChangeKey::Measure {
                        name: live.name.clone(),
                    },
                    EntityValue::Measure((*live).clone()),
                ));
            }
        }
    }

    Ok(())
}

fn diff_relationships(
    base: &SemanticModel,
    target: &SemanticModel,
    options: &DiffOptions,
    names: &LiveNames,
    changes: &mut Vec<Change>,
) -> SyncResult<()> {
    let label = |r: &SemanticRelationship| format!("relationship '{}'", r.key);

    let base_rels = index_by(
        base.relationships.iter(),
        |r| options.fold_relationship(&r.key),
        label,
    )?;
    let target_rels = index_by(
        target.relationships.iter(),
        |r| options.fold_relationship(&r.key),
        label,
    )?;

    for (key, wanted) in &target_rels {
        match base_rels.get(key) {
            None => {
                let mut added = (*wanted).clone();
                added.key = names.relationship(&wanted.key);
                changes.push(Change::add(
                    ChangeKey::Relationship(added.key.clone()),
                    EntityValue::Relationship(added),
                ))
            }
            Some(live) => {
                let mut after = (*wanted).clone();
                after.key = live.key.clone();

                let fields = relationship_changed_fields(live, &after);
                if !fields.is_empty() {
                    changes.push(Change::modify(
                        ChangeKey::Relationship(live.key.clone()),
                        EntityValue::Relationship((*live).clone()),
                        EntityValue::Relationship(after),
                        fields,
                    ));
                }
            }
        }
    }

    if options.allow_remove {
        for (key, live) in &base_rels {
            if !target_rels.contains_key(key) {
                changes.push(Change::remove(
                    ChangeKey::Relationship(live.key.clone()),
                    EntityValue::Relationship((*live).clone()),
                ));
            }
        }
    }

    Ok(())
}

/// Whether applying `change` would be a no-op given `live`
///
/// Used by the applier's idempotency check. `live` is the target's current
/// value of the changed entity, `None` when it does not exist.
pub fn is_satisfied(change: &Change, live: Option<&EntityValue>) -> bool {
    match change.operation {
        Operation::Remove => live.is_none(),
        Operation::Add | Operation::Modify => match (change.after.as_ref(), live) {
            (Some(EntityValue::Table(after)), Some(EntityValue::Table(live))) => {
                if !table_changed_fields(live, after).is_empty() {
                    return false;
                }
                // A MODIFY only covers the table header; an ADD covers its columns too
                change.operation == Operation::Modify
                    || live.canonical().columns == after.canonical().columns
            }
            (Some(EntityValue::Column(after)), Some(EntityValue::Column(live))) => {
                column_changed_fields(live, after).is_empty()
            }
            (Some(EntityValue::Measure(after)), Some(EntityValue::Measure(live))) => {
                measure_changed_fields(live, after).is_empty()
            }
            (Some(EntityValue::Relationship(after)), Some(EntityValue::Relationship(live))) => {
                relationship_changed_fields(live, after).is_empty()
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::change::EntityKind;
    use crate::model::{Cardinality, DataType};

    fn sales_table() -> SemanticTable {
        SemanticTable::new(
            "SALES_DATA",
            vec![
                SemanticColumn::new("ORDER_ID", DataType::Int64).not_null(),
                SemanticColumn::new("CUSTOMER_NAME", DataType::String),
                SemanticColumn::new("PRICE", DataType::Decimal),
            ],
        )
    }

    fn products_table() -> SemanticTable {
        SemanticTable::new(
            "PRODUCTS",
            vec![
                SemanticColumn::new("PRODUCT_ID", DataType::Int64),
                SemanticColumn::new("NAME", DataType::String),
            ],
        )
    }

    fn model(tables: Vec<SemanticTable>) -> SemanticModel {
        SemanticModel::new("Sales", "test").with_tables(tables)
    }

    fn ops(set: &ChangeSet) -> Vec<String> {
        set.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_identical_models_produce_no_changes() {
        let m = model(vec![sales_table(), products_table()])
            .with_measures(vec![SemanticMeasure::new("Revenue", "SALES_DATA", "SUM(PRICE)")])
            .with_relationships(vec![SemanticRelationship::new(
                RelationshipKey::new("SALES_DATA", "ORDER_ID", "PRODUCTS", "PRODUCT_ID"),
                Cardinality::ManyToOne,
            )]);

        assert!(diff(&m, &m, &DiffOptions::forward()).unwrap().is_empty());
        assert!(diff(&m, &m, &DiffOptions::restore()).unwrap().is_empty());
    }

    #[test]
    fn test_new_table_is_single_add() {
        let base = model(vec![sales_table()]);
        let target = model(vec![sales_table(), products_table()]);

        let set = diff(&base, &target, &DiffOptions::forward()).unwrap();
        assert_eq!(ops(&set), vec!["ADD table 'PRODUCTS'"]);
        let table = set.changes()[0].after.as_ref().unwrap().as_table().unwrap();
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn test_forward_sync_never_removes() {
        let mut live_sales = sales_table();
        live_sales.columns.push(SemanticColumn::new("LEGACY", DataType::String));
        let live = model(vec![live_sales, products_table()])
            .with_measures(vec![SemanticMeasure::new("Old", "PRODUCTS", "1")]);
        let source = model(vec![sales_table()]);

        let set = diff(&live, &source, &DiffOptions::forward()).unwrap();
        assert!(set.iter().all(|c| c.operation != Operation::Remove));
        assert!(set.is_empty());
    }

    #[test]
    fn test_restore_removes_extra_column() {
        let mut live_sales = sales_table();
        live_sales
            .columns
            .push(SemanticColumn::new("ROLLBACK_TEST_COL", DataType::String));
        let live = model(vec![live_sales]);
        let snapshot = model(vec![sales_table()]);

        let set = diff(&live, &snapshot, &DiffOptions::restore()).unwrap();
        assert_eq!(ops(&set), vec!["REMOVE column 'SALES_DATA.ROLLBACK_TEST_COL'"]);
    }

    #[test]
    fn test_type_change_marked_destructive() {
        let base = model(vec![sales_table()]);
        let mut changed = sales_table();
        changed.columns[2].data_type = DataType::Double;
        let target = model(vec![changed]);

        let set = diff(&base, &target, &DiffOptions::forward()).unwrap();
        assert_eq!(set.len(), 1);
        let change = &set.changes()[0];
        assert!(change.destructive);
        assert_eq!(change.changed_fields, vec!["data_type".to_string()]);
        assert!(change.before.is_some() && change.after.is_some());
    }

    #[test]
    fn test_description_only_difference_is_modify() {
        let base = model(vec![sales_table()]);
        let mut described = sales_table();
        described.columns[1].description = "Billing name".to_string();
        let target = model(vec![described.with_description("Order lines")]);

        let set = diff(&base, &target, &DiffOptions::forward()).unwrap();
        assert_eq!(
            ops(&set),
            vec![
                "MODIFY table 'SALES_DATA' (description)",
                "MODIFY column 'SALES_DATA.CUSTOMER_NAME' (description)",
            ]
        );
        assert!(set.iter().all(|c| !c.destructive));
    }

    #[test]
    fn test_ordering_phases_and_lexical_ties() {
        let mut live_sales = sales_table();
        live_sales.columns.push(SemanticColumn::new("ZZZ", DataType::String));
        let live = model(vec![live_sales, products_table()]).with_relationships(vec![
            SemanticRelationship::new(
                RelationshipKey::new("SALES_DATA", "ORDER_ID", "PRODUCTS", "PRODUCT_ID"),
                Cardinality::ManyToOne,
            ),
        ]);

        let mut wanted_sales = sales_table();
        wanted_sales.columns.push(SemanticColumn::new("QTY", DataType::Int64));
        wanted_sales.columns.push(SemanticColumn::new("DISCOUNT", DataType::Double));
        let customers = SemanticTable::new(
            "CUSTOMERS",
            vec![SemanticColumn::new("ID", DataType::Int64)],
        );
        let target = model(vec![wanted_sales, customers]).with_relationships(vec![
            SemanticRelationship::new(
                RelationshipKey::new("SALES_DATA", "ORDER_ID", "CUSTOMERS", "ID"),
                Cardinality::ManyToOne,
            ),
        ]);

        let set = diff(&live, &target, &DiffOptions::restore()).unwrap();
        assert_eq!(
            ops(&set),
            vec![
                "ADD table 'CUSTOMERS'",
                "ADD column 'SALES_DATA.DISCOUNT'",
                "ADD column 'SALES_DATA.QTY'",
                "REMOVE column 'SALES_DATA.ZZZ'",
                "REMOVE table 'PRODUCTS'",
                "ADD relationship 'SALES_DATA.ORDER_ID->CUSTOMERS.ID'",
                "REMOVE relationship 'SALES_DATA.ORDER_ID->PRODUCTS.PRODUCT_ID'",
            ]
        );
    }

    #[test]
    fn test_case_insensitive_keeps_live_names() {
        let live = model(vec![sales_table()]);
        let mut lower = sales_table();
        lower.name = "sales_data".to_string();
        for column in &mut lower.columns {
            column.name = column.name.to_lowercase();
        }
        let target = model(vec![lower]);

        let sensitive = diff(&live, &target, &DiffOptions::forward()).unwrap();
        assert_eq!(ops(&sensitive), vec!["ADD table 'sales_data'"]);

        let options = DiffOptions::forward().case_insensitive(true);
        assert!(diff(&live, &target, &options).unwrap().is_empty());
    }

    #[test]
    fn test_case_insensitive_rewrites_references_to_live_names() {
        let live = model(vec![sales_table(), products_table()])
            .with_measures(vec![SemanticMeasure::new("Revenue", "SALES_DATA", "SUM(PRICE)")]);

        let mut sales = sales_table();
        sales.name = "sales_data".to_string();
        let mut products = products_table();
        products.name = "products".to_string();
        products.columns[0].name = "product_id".to_string();
        let target = model(vec![sales, products])
            .with_measures(vec![
                SemanticMeasure::new("Revenue", "sales_data", "SUM(PRICE)"),
                SemanticMeasure::new("Customers", "sales_data", "DISTINCTCOUNT(CUSTOMER_NAME)"),
            ])
            .with_relationships(vec![SemanticRelationship::new(
                RelationshipKey::new("sales_data", "order_id", "products", "product_id"),
                Cardinality::ManyToOne,
            )]);

        let options = DiffOptions::forward().case_insensitive(true);
        let set = diff(&live, &target, &options).unwrap();
        assert_eq!(
            ops(&set),
            vec![
                "ADD measure 'Customers'",
                "ADD relationship 'SALES_DATA.ORDER_ID->PRODUCTS.PRODUCT_ID'",
            ]
        );
        match set.changes()[0].after.as_ref() {
            Some(EntityValue::Measure(m)) => assert_eq!(m.table, "SALES_DATA"),
            other => panic!("unexpected after-value {:?}", other),
        }
        match set.changes()[1].after.as_ref() {
            Some(EntityValue::Relationship(r)) => assert_eq!(
                r.key,
                RelationshipKey::new("SALES_DATA", "ORDER_ID", "PRODUCTS", "PRODUCT_ID")
            ),
            other => panic!("unexpected after-value {:?}", other),
        }
    }

    #[test]
    fn test_case_fold_collision_is_conflict() {
        let mut sales = sales_table();
        sales.columns.push(SemanticColumn::new("price", DataType::Double));
        let m = model(vec![sales]);

        let options = DiffOptions::forward().case_insensitive(true);
        assert!(matches!(
            diff(&m, &m, &options),
            Err(SyncError::DiffConflict { .. })
        ));
    }

    #[test]
    fn test_ignore_hidden() {
        let base = model(vec![sales_table()]);
        let mut hidden = products_table();
        hidden.hidden = true;
        let target = model(vec![sales_table(), hidden]);

        let options = DiffOptions::forward().ignore_hidden(true);
        assert!(diff(&base, &target, &options).unwrap().is_empty());
        assert_eq!(diff(&base, &target, &DiffOptions::forward()).unwrap().len(), 1);
    }

    #[test]
    fn test_metadata_only_mode() {
        let base = model(vec![sales_table()]);
        let mut changed = sales_table();
        changed.columns[0].description = "Order key".to_string();
        changed.columns[2].data_type = DataType::Double;
        let target = model(vec![changed, products_table()]);

        let options = DiffOptions::forward().mode(SyncMode::MetadataOnly);
        let set = diff(&base, &target, &options).unwrap();
        assert_eq!(ops(&set), vec!["MODIFY column 'SALES_DATA.ORDER_ID' (description)"]);
    }

    #[test]
    fn test_measure_and_relationship_modify() {
        let key = RelationshipKey::new("SALES_DATA", "ORDER_ID", "PRODUCTS", "PRODUCT_ID");
        let base = model(vec![sales_table(), products_table()])
            .with_measures(vec![SemanticMeasure::new("Revenue", "SALES_DATA", "SUM(PRICE)")])
            .with_relationships(vec![SemanticRelationship::new(key.clone(), Cardinality::ManyToOne)]);

        let mut rel = SemanticRelationship::new(key, Cardinality::OneToOne);
        rel.active = false;
        let target = model(vec![sales_table(), products_table()])
            .with_measures(vec![SemanticMeasure::new("Revenue", "SALES_DATA", "SUMX(PRICE)")])
            .with_relationships(vec![rel]);

        let set = diff(&base, &target, &DiffOptions::forward()).unwrap();
        let kinds: Vec<EntityKind> = set.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![EntityKind::Measure, EntityKind::Relationship]);
        assert_eq!(
            set.changes()[1].changed_fields,
            vec!["cardinality".to_string(), "active".to_string()]
        );
    }

    #[test]
    fn test_is_satisfied() {
        let col = SemanticColumn::new("QTY", DataType::Int64);
        let change = Change::add(
            ChangeKey::Column {
                table: "SALES_DATA".to_string(),
                column: "QTY".to_string(),
            },
            EntityValue::Column(col.clone()),
        );

        assert!(!is_satisfied(&change, None));
        assert!(is_satisfied(&change, Some(&EntityValue::Column(col.clone()))));
        let other = SemanticColumn::new("QTY", DataType::String);
        assert!(!is_satisfied(&change, Some(&EntityValue::Column(other))));

        let removal = Change::remove(change.key.clone(), EntityValue::Column(col.clone()));
        assert!(is_satisfied(&removal, None));
        assert!(!is_satisfied(&removal, Some(&EntityValue::Column(col))));
    }
}
