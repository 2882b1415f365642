//! Change and ChangeSet types produced by the detector
//!
//! A ChangeSet is ordered and immutable once built. Construction sorts the
//! entries into apply order and refuses duplicate (kind, key) pairs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{SyncError, SyncResult};
use crate::model::{
    RelationshipKey, SemanticColumn, SemanticMeasure, SemanticRelationship, SemanticTable,
};

/// Kind of entity a change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Table,
    Column,
    Measure,
    Relationship,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Measure => "measure",
            Self::Relationship => "relationship",
        }
    }
}

/// What happens to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Add,
    Modify,
    Remove,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Modify => "~",
            Self::Remove => "-",
        }
    }
}

/// Natural key of the targeted entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeKey {
    Table { table: String },
    Column { table: String, column: String },
    Measure { name: String },
    Relationship(RelationshipKey),
}

impl ChangeKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Table { .. } => EntityKind::Table,
            Self::Column { .. } => EntityKind::Column,
            Self::Measure { .. } => EntityKind::Measure,
            Self::Relationship(_) => EntityKind::Relationship,
        }
    }

    /// Table this key belongs to, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Table { table } | Self::Column { table, .. } => Some(table),
            Self::Measure { .. } | Self::Relationship(_) => None,
        }
    }
}

impl std::fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKey::Table { table } => write!(f, "{}", table),
            ChangeKey::Column { table, column } => write!(f, "{}.{}", table, column),
            ChangeKey::Measure { name } => write!(f, "{}", name),
            ChangeKey::Relationship(key) => write!(f, "{}", key),
        }
    }
}

/// Full value of an entity on one side of a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EntityValue {
    Table(SemanticTable),
    Column(SemanticColumn),
    Measure(SemanticMeasure),
    Relationship(SemanticRelationship),
}

impl EntityValue {
    pub fn as_table(&self) -> Option<&SemanticTable> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&SemanticColumn> {
        match self {
            Self::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_measure(&self) -> Option<&SemanticMeasure> {
        match self {
            Self::Measure(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&SemanticRelationship> {
        match self {
            Self::Relationship(r) => Some(r),
            _ => None,
        }
    }
}

/// Attributes that only affect presentation
pub const COSMETIC_FIELDS: &[&str] = &["description", "format_string", "folder", "hidden"];

/// A single structural change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub key: ChangeKey,
    pub operation: Operation,
    /// Absent for ADD
    pub before: Option<EntityValue>,
    /// Absent for REMOVE
    pub after: Option<EntityValue>,
    /// Attribute names that differ (MODIFY only)
    #[serde(default)]
    pub changed_fields: Vec<String>,
    /// Column type change; may need drop + recreate on the target
    #[serde(default)]
    pub destructive: bool,
}

impl Change {
    pub fn add(key: ChangeKey, after: EntityValue) -> Self {
        Self {
            key,
            operation: Operation::Add,
            before: None,
            after: Some(after),
            changed_fields: Vec::new(),
            destructive: false,
        }
    }

    pub fn modify(
        key: ChangeKey,
        before: EntityValue,
        after: EntityValue,
        changed_fields: Vec<&'static str>,
    ) -> Self {
        let destructive = key.kind() == EntityKind::Column && changed_fields.contains(&"data_type");
        Self {
            key,
            operation: Operation::Modify,
            before: Some(before),
            after: Some(after),
            changed_fields: changed_fields.into_iter().map(str::to_string).collect(),
            destructive,
        }
    }

    pub fn remove(key: ChangeKey, before: EntityValue) -> Self {
        Self {
            key,
            operation: Operation::Remove,
            before: Some(before),
            after: None,
            changed_fields: Vec::new(),
            destructive: false,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.key.kind()
    }

    /// Apply-order phase; lower phases run first
    pub fn phase(&self) -> u8 {
        match (self.kind(), self.operation) {
            (EntityKind::Table, Operation::Add) => 0,
            (EntityKind::Table, Operation::Modify) => 1,
            (EntityKind::Column, Operation::Add) => 2,
            (EntityKind::Column, Operation::Modify) => 3,
            (EntityKind::Measure, Operation::Add) => 4,
            (EntityKind::Measure, Operation::Modify) => 5,
            (EntityKind::Measure, Operation::Remove) => 6,
            (EntityKind::Column, Operation::Remove) => 7,
            (EntityKind::Table, Operation::Remove) => 8,
            (EntityKind::Relationship, Operation::Add) => 9,
            (EntityKind::Relationship, Operation::Modify) => 10,
            (EntityKind::Relationship, Operation::Remove) => 11,
        }
    }

    /// MODIFY touching presentation attributes only
    pub fn is_cosmetic(&self) -> bool {
        self.operation == Operation::Modify
            && !self.changed_fields.is_empty()
            && self
                .changed_fields
                .iter()
                .all(|f| COSMETIC_FIELDS.contains(&f.as_str()))
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} '{}'",
            self.operation.label(),
            self.kind().label(),
            self.key
        )?;
        if !self.changed_fields.is_empty() {
            write!(f, " ({})", self.changed_fields.join(", "))?;
        }
        if self.destructive {
            write!(f, " [destructive]")?;
        }
        Ok(())
    }
}

/// Counts by operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub destructive: usize,
}

impl ChangeSummary {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

/// Ordered, duplicate-free sequence of changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Sort into apply order and check key uniqueness
    pub fn new(mut changes: Vec<Change>) -> SyncResult<Self> {
        let mut seen = HashSet::new();
        for change in &changes {
            if !seen.insert(&change.key) {
                return Err(SyncError::DiffConflict {
                    key: format!("{} '{}'", change.kind().label(), change.key),
                });
            }
        }

        changes.sort_by(|a, b| a.phase().cmp(&b.phase()).then_with(|| a.key.cmp(&b.key)));
        Ok(Self { changes })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// New set holding only the changes `keep` accepts; order is preserved
    pub fn filtered(&self, keep: impl Fn(&Change) -> bool) -> Self {
        Self {
            changes: self.changes.iter().filter(|c| keep(c)).cloned().collect(),
        }
    }

    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for change in &self.changes {
            match change.operation {
                Operation::Add => summary.added += 1,
                Operation::Modify => summary.modified += 1,
                Operation::Remove => summary.removed += 1,
            }
            if change.destructive {
                summary.destructive += 1;
            }
        }
        summary
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;

    fn column_key(table: &str, column: &str) -> ChangeKey {
        ChangeKey::Column {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    #[test]
    fn test_duplicate_key_is_conflict() {
        let col = SemanticColumn::new("QTY", DataType::Int64);
        let changes = vec![
            Change::add(column_key("SALES", "QTY"), EntityValue::Column(col.clone())),
            Change::remove(column_key("SALES", "QTY"), EntityValue::Column(col)),
        ];

        assert!(matches!(
            ChangeSet::new(changes),
            Err(SyncError::DiffConflict { .. })
        ));
    }

    #[test]
    fn test_type_change_is_destructive() {
        let before = SemanticColumn::new("PRICE", DataType::Decimal);
        let after = SemanticColumn::new("PRICE", DataType::Double);
        let change = Change::modify(
            column_key("SALES", "PRICE"),
            EntityValue::Column(before),
            EntityValue::Column(after),
            vec!["data_type"],
        );

        assert!(change.destructive);
        assert!(!change.is_cosmetic());
        assert_eq!(
            change.to_string(),
            "MODIFY column 'SALES.PRICE' (data_type) [destructive]"
        );
    }

    #[test]
    fn test_description_change_is_cosmetic() {
        let before = SemanticColumn::new("PRICE", DataType::Decimal);
        let after = before.clone().with_description("Unit price");
        let change = Change::modify(
            column_key("SALES", "PRICE"),
            EntityValue::Column(before),
            EntityValue::Column(after),
            vec!["description"],
        );

        assert!(change.is_cosmetic());
        assert!(!change.destructive);
    }

    #[test]
    fn test_summary_counts() {
        let col = SemanticColumn::new("A", DataType::String);
        let set = ChangeSet::new(vec![
            Change::add(column_key("T", "A"), EntityValue::Column(col.clone())),
            Change::remove(column_key("T", "B"), EntityValue::Column(col)),
        ])
        .unwrap();

        let summary = set.summary();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.total(), 2);
    }
}
