//! Raw schema extracts as handed over by connectors
//!
//! Field names follow what the platform readers emit; every type name is
//! still native to the platform the extract came from.

use serde::{Deserialize, Serialize};

use crate::model::Dialect;

/// Schema extract read from one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSchema {
    pub name: String,
    pub dialect: Dialect,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub measures: Vec<RawMeasure>,
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
}

impl RawSchema {
    pub fn empty(name: &str, dialect: Dialect) -> Self {
        Self {
            name: name.to_string(),
            dialect,
            version: None,
            tables: Vec::new(),
            measures: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<RawColumn>,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    /// Native type name, e.g. "VARCHAR" or "Int64"
    pub data_type: String,
    #[serde(default)]
    pub is_nullable: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasure {
    pub name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    pub expression: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub format_string: Option<String>,
    #[serde(default)]
    pub display_folder: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    #[serde(default)]
    pub name: Option<String>,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    #[serde(default)]
    pub cardinality: Option<String>,
    #[serde(default)]
    pub cross_filter_direction: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}
