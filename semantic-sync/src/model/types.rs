//! Canonical semantic model types
//!
//! These types are the platform-neutral representation every other module
//! works on. Models are values: transformations return new instances and
//! nothing mutates a model held by another component.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::data_type::DataType;

/// A column inside a semantic table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticColumn {
    /// Unique within its table
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
}

impl SemanticColumn {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: true,
            description: String::new(),
            hidden: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// A table with its columns
///
/// Column order is kept for display and ignored by comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticTable {
    /// Unique within the model
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub columns: Vec<SemanticColumn>,
    #[serde(default)]
    pub hidden: bool,
}

impl SemanticTable {
    pub fn new(name: &str, columns: Vec<SemanticColumn>) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            columns,
            hidden: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn column(&self, name: &str) -> Option<&SemanticColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Copy of this table with columns sorted by name
    pub fn canonical(&self) -> Self {
        let mut table = self.clone();
        table.columns.sort_by(|a, b| a.name.cmp(&b.name));
        table
    }
}

/// A calculated measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticMeasure {
    /// Unique within the model
    pub name: String,
    /// Owning table name
    pub table: String,
    /// Source expression, kept opaque
    pub expression: String,
    #[serde(default)]
    pub description: String,
    /// Output format hint (e.g. "$#,##0.00")
    #[serde(default)]
    pub format_string: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl SemanticMeasure {
    pub fn new(name: &str, table: &str, expression: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            expression: expression.to_string(),
            description: String::new(),
            format_string: None,
            folder: None,
            hidden: false,
        }
    }
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OneToOne => "one-to-one",
            Self::OneToMany => "one-to-many",
            Self::ManyToOne => "many-to-one",
            Self::ManyToMany => "many-to-many",
        }
    }
}

impl std::str::FromStr for Cardinality {
    type Err = String;

    /// Accepts "many-to-one", "ManyToOne", "many_to_one" and "*:1" styles
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squashed: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match squashed.as_str() {
            "onetoone" | "1:1" => Ok(Self::OneToOne),
            "onetomany" | "1:*" | "1:n" => Ok(Self::OneToMany),
            "manytoone" | "*:1" | "n:1" => Ok(Self::ManyToOne),
            "manytomany" | "*:*" | "n:n" => Ok(Self::ManyToMany),
            _ => Err(format!("unknown cardinality '{}'", s)),
        }
    }
}

/// Cross-filter direction of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossFilter {
    #[default]
    Single,
    Both,
}

impl std::str::FromStr for CrossFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "single" | "onedirection" => Ok(Self::Single),
            "both" | "bothdirections" => Ok(Self::Both),
            other => Err(format!("unknown cross-filter direction '{}'", other)),
        }
    }
}

/// Natural key of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl RelationshipKey {
    pub fn new(from_table: &str, from_column: &str, to_table: &str, to_column: &str) -> Self {
        Self {
            from_table: from_table.to_string(),
            from_column: from_column.to_string(),
            to_table: to_table.to_string(),
            to_column: to_column.to_string(),
        }
    }

    pub fn touches_table(&self, table: &str) -> bool {
        self.from_table == table || self.to_table == table
    }
}

impl std::fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}->{}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
    }
}

/// Edge between two table columns
///
/// Relationships are independent records keyed by their 4-tuple; tables
/// never point at each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticRelationship {
    #[serde(flatten)]
    pub key: RelationshipKey,
    /// Display name, not part of identity
    #[serde(default)]
    pub name: Option<String>,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub cross_filter: CrossFilter,
    pub active: bool,
}

impl SemanticRelationship {
    pub fn new(key: RelationshipKey, cardinality: Cardinality) -> Self {
        Self {
            key,
            name: None,
            cardinality,
            cross_filter: CrossFilter::Single,
            active: true,
        }
    }
}

/// A complete semantic model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub name: String,
    /// Source system tag (e.g. "snowflake-prod")
    pub source: String,
    #[serde(default)]
    pub tables: Vec<SemanticTable>,
    #[serde(default)]
    pub measures: Vec<SemanticMeasure>,
    #[serde(default)]
    pub relationships: Vec<SemanticRelationship>,
    /// Monotonic version counter
    #[serde(default = "first_version")]
    pub version: u64,
}

fn first_version() -> u64 {
    1
}

impl SemanticModel {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            tables: Vec::new(),
            measures: Vec::new(),
            relationships: Vec::new(),
            version: first_version(),
        }
    }

    pub fn with_tables(mut self, tables: Vec<SemanticTable>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_measures(mut self, measures: Vec<SemanticMeasure>) -> Self {
        self.measures = measures;
        self
    }

    pub fn with_relationships(mut self, relationships: Vec<SemanticRelationship>) -> Self {
        self.relationships = relationships;
        self
    }

    /// New instance carrying the next version number
    pub fn next_version(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next
    }

    pub fn table(&self, name: &str) -> Option<&SemanticTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&SemanticMeasure> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn relationship(&self, key: &RelationshipKey) -> Option<&SemanticRelationship> {
        self.relationships.iter().find(|r| &r.key == key)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Check the uniqueness invariants, returning the first offending key
    pub fn validate(&self) -> Result<(), String> {
        let mut tables = HashSet::new();
        for table in &self.tables {
            if !tables.insert(table.name.as_str()) {
                return Err(format!("duplicate table '{}'", table.name));
            }
            let mut columns = HashSet::new();
            for column in &table.columns {
                if !columns.insert(column.name.as_str()) {
                    return Err(format!(
                        "duplicate column '{}.{}'",
                        table.name, column.name
                    ));
                }
            }
        }

        let mut measures = HashSet::new();
        for measure in &self.measures {
            if !measures.insert(measure.name.as_str()) {
                return Err(format!("duplicate measure '{}'", measure.name));
            }
        }

        let mut relationships = HashSet::new();
        for rel in &self.relationships {
            if !relationships.insert(&rel.key) {
                return Err(format!("duplicate relationship '{}'", rel.key));
            }
        }

        Ok(())
    }

    /// Copy with every collection sorted by natural key
    pub fn canonical(&self) -> Self {
        let mut model = self.clone();
        model.tables = self.tables.iter().map(SemanticTable::canonical).collect();
        model.tables.sort_by(|a, b| a.name.cmp(&b.name));
        model.measures.sort_by(|a, b| a.name.cmp(&b.name));
        model.relationships.sort_by(|a, b| a.key.cmp(&b.key));
        model
    }

    /// Equality of tables, columns, measures and relationships, ignoring
    /// identity, version and collection order
    pub fn structurally_eq(&self, other: &SemanticModel) -> bool {
        let a = self.canonical();
        let b = other.canonical();
        a.tables == b.tables && a.measures == b.measures && a.relationships == b.relationships
    }
}
