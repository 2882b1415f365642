//! Model normalizer
//!
//! Pure conversion between raw schema extracts and the canonical model.
//! No I/O happens here; connectors hand in a `RawSchema` and get back a
//! `SemanticModel` or a `SchemaRead` error naming the offending entity.

pub mod raw;

pub use raw::{RawColumn, RawMeasure, RawRelationship, RawSchema, RawTable};

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Cardinality, CrossFilter, Dialect, RelationshipKey, SemanticColumn, SemanticMeasure,
    SemanticModel, SemanticRelationship, SemanticTable,
};

/// Convert a raw extract into a canonical model tagged with `source_tag`
pub fn normalize(raw: &RawSchema, source_tag: &str) -> SyncResult<SemanticModel> {
    let tables = raw
        .tables
        .iter()
        .map(|t| normalize_table(t, raw.dialect))
        .collect::<SyncResult<Vec<_>>>()?;

    let measures = raw
        .measures
        .iter()
        .map(normalize_measure)
        .collect::<SyncResult<Vec<_>>>()?;

    let relationships = raw
        .relationships
        .iter()
        .map(normalize_relationship)
        .collect::<SyncResult<Vec<_>>>()?;

    let mut model = SemanticModel::new(&raw.name, source_tag)
        .with_tables(tables)
        .with_measures(measures)
        .with_relationships(relationships);
    if let Some(version) = raw.version {
        model.version = version;
    }

    model
        .validate()
        .map_err(|message| SyncError::schema_read(&raw.name, message))?;

    Ok(model)
}

pub fn normalize_table(raw: &RawTable, dialect: Dialect) -> SyncResult<SemanticTable> {
    let columns = raw
        .columns
        .iter()
        .map(|c| normalize_column(&raw.name, c, dialect))
        .collect::<SyncResult<Vec<_>>>()?;

    Ok(SemanticTable {
        name: raw.name.clone(),
        description: clean_text(raw.description.as_deref()),
        columns,
        hidden: raw.is_hidden,
    })
}

pub fn normalize_column(
    table_name: &str,
    raw: &RawColumn,
    dialect: Dialect,
) -> SyncResult<SemanticColumn> {
    let data_type = dialect.from_native(&raw.data_type).map_err(|e| {
        SyncError::schema_read(format!("{}.{}", table_name, raw.name), e.to_string())
    })?;

    Ok(SemanticColumn {
        name: raw.name.clone(),
        data_type,
        nullable: raw.is_nullable.unwrap_or(true),
        description: clean_text(raw.description.as_deref()),
        hidden: raw.is_hidden,
    })
}

pub fn normalize_measure(raw: &RawMeasure) -> SyncResult<SemanticMeasure> {
    let table = raw
        .table_name
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SyncError::schema_read(&raw.name, "measure has no owning table"))?;

    Ok(SemanticMeasure {
        name: raw.name.clone(),
        table: table.to_string(),
        expression: raw.expression.trim().to_string(),
        description: clean_text(raw.description.as_deref()),
        format_string: clean_optional(raw.format_string.as_deref()),
        folder: clean_optional(raw.display_folder.as_deref()),
        hidden: raw.is_hidden,
    })
}

pub fn normalize_relationship(raw: &RawRelationship) -> SyncResult<SemanticRelationship> {
    let key = RelationshipKey::new(&raw.from_table, &raw.from_column, &raw.to_table, &raw.to_column);

    let cardinality = match raw.cardinality.as_deref() {
        Some(c) => c
            .parse::<Cardinality>()
            .map_err(|e| SyncError::schema_read(key.to_string(), e))?,
        None => Cardinality::ManyToOne,
    };
    let cross_filter = match raw.cross_filter_direction.as_deref() {
        Some(d) => d
            .parse::<CrossFilter>()
            .map_err(|e| SyncError::schema_read(key.to_string(), e))?,
        None => CrossFilter::Single,
    };

    Ok(SemanticRelationship {
        key,
        name: clean_optional(raw.name.as_deref()),
        cardinality,
        cross_filter,
        active: raw.is_active.unwrap_or(true),
    })
}

/// Render a canonical model back into a raw extract for `dialect`
pub fn to_raw(model: &SemanticModel, dialect: Dialect) -> RawSchema {
    RawSchema {
        name: model.name.clone(),
        dialect,
        version: Some(model.version),
        tables: model.tables.iter().map(|t| table_to_raw(t, dialect)).collect(),
        measures: model.measures.iter().map(measure_to_raw).collect(),
        relationships: model.relationships.iter().map(relationship_to_raw).collect(),
    }
}

pub fn table_to_raw(table: &SemanticTable, dialect: Dialect) -> RawTable {
    RawTable {
        name: table.name.clone(),
        description: optional_text(&table.description),
        columns: table
            .columns
            .iter()
            .map(|c| column_to_raw(c, dialect))
            .collect(),
        is_hidden: table.hidden,
    }
}

pub fn column_to_raw(column: &SemanticColumn, dialect: Dialect) -> RawColumn {
    RawColumn {
        name: column.name.clone(),
        data_type: dialect.to_native(column.data_type).to_string(),
        is_nullable: Some(column.nullable),
        description: optional_text(&column.description),
        is_hidden: column.hidden,
    }
}

pub fn measure_to_raw(measure: &SemanticMeasure) -> RawMeasure {
    RawMeasure {
        name: measure.name.clone(),
        table_name: Some(measure.table.clone()),
        expression: measure.expression.clone(),
        description: optional_text(&measure.description),
        format_string: measure.format_string.clone(),
        display_folder: measure.folder.clone(),
        is_hidden: measure.hidden,
    }
}

pub fn relationship_to_raw(rel: &SemanticRelationship) -> RawRelationship {
    RawRelationship {
        name: rel.name.clone(),
        from_table: rel.key.from_table.clone(),
        from_column: rel.key.from_column.clone(),
        to_table: rel.key.to_table.clone(),
        to_column: rel.key.to_column.clone(),
        cardinality: Some(rel.cardinality.label().to_string()),
        cross_filter_direction: Some(
            match rel.cross_filter {
                CrossFilter::Single => "single",
                CrossFilter::Both => "both",
            }
            .to_string(),
        ),
        is_active: Some(rel.active),
    }
}

fn clean_text(text: Option<&str>) -> String {
    text.map(str::trim).unwrap_or_default().to_string()
}

fn clean_optional(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn optional_text(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
