//! Primitive operations over a raw schema held by a store-backed connector

use super::{ConnectorError, ConnectorResult};
use crate::model::RelationshipKey;
use crate::normalize::{RawColumn, RawMeasure, RawRelationship, RawSchema, RawTable};

fn relationship_key(rel: &RawRelationship) -> RelationshipKey {
    RelationshipKey::new(&rel.from_table, &rel.from_column, &rel.to_table, &rel.to_column)
}

fn table_mut<'a>(schema: &'a mut RawSchema, table: &str) -> ConnectorResult<&'a mut RawTable> {
    schema
        .tables
        .iter_mut()
        .find(|t| t.name == table)
        .ok_or_else(|| ConnectorError::not_found(format!("table '{}' does not exist", table)))
}

fn column_mut<'a>(
    schema: &'a mut RawSchema,
    table: &str,
    column: &str,
) -> ConnectorResult<&'a mut RawColumn> {
    table_mut(schema, table)?
        .columns
        .iter_mut()
        .find(|c| c.name == column)
        .ok_or_else(|| {
            ConnectorError::not_found(format!("column '{}.{}' does not exist", table, column))
        })
}

pub fn read_table(schema: &RawSchema, table: &str) -> Option<RawTable> {
    schema.tables.iter().find(|t| t.name == table).cloned()
}

pub fn read_measure(schema: &RawSchema, name: &str) -> Option<RawMeasure> {
    schema.measures.iter().find(|m| m.name == name).cloned()
}

pub fn read_relationship(schema: &RawSchema, key: &RelationshipKey) -> Option<RawRelationship> {
    schema
        .relationships
        .iter()
        .find(|r| relationship_key(r) == *key)
        .cloned()
}

pub fn create_table(schema: &mut RawSchema, table: &RawTable) -> ConnectorResult<()> {
    if schema.tables.iter().any(|t| t.name == table.name) {
        return Err(ConnectorError::rejected(format!(
            "table '{}' already exists",
            table.name
        )));
    }
    schema.tables.push(table.clone());
    Ok(())
}

pub fn set_table_metadata(
    schema: &mut RawSchema,
    table: &str,
    description: Option<&str>,
    hidden: bool,
) -> ConnectorResult<()> {
    let entry = table_mut(schema, table)?;
    entry.description = description.map(str::to_string);
    entry.is_hidden = hidden;
    Ok(())
}

pub fn drop_table(schema: &mut RawSchema, table: &str) -> ConnectorResult<()> {
    let before = schema.tables.len();
    schema.tables.retain(|t| t.name != table);
    if schema.tables.len() == before {
        return Err(ConnectorError::not_found(format!(
            "table '{}' does not exist",
            table
        )));
    }
    Ok(())
}

pub fn add_column(schema: &mut RawSchema, table: &str, column: &RawColumn) -> ConnectorResult<()> {
    let entry = table_mut(schema, table)?;
    if entry.columns.iter().any(|c| c.name == column.name) {
        return Err(ConnectorError::rejected(format!(
            "column '{}.{}' already exists",
            table, column.name
        )));
    }
    entry.columns.push(column.clone());
    Ok(())
}

pub fn alter_column_type(
    schema: &mut RawSchema,
    table: &str,
    column: &str,
    native_type: &str,
) -> ConnectorResult<()> {
    column_mut(schema, table, column)?.data_type = native_type.to_string();
    Ok(())
}

pub fn update_column(schema: &mut RawSchema, table: &str, column: &RawColumn) -> ConnectorResult<()> {
    let entry = column_mut(schema, table, &column.name)?;
    entry.is_nullable = column.is_nullable;
    entry.description = column.description.clone();
    entry.is_hidden = column.is_hidden;
    Ok(())
}

pub fn drop_column(schema: &mut RawSchema, table: &str, column: &str) -> ConnectorResult<()> {
    let entry = table_mut(schema, table)?;
    let before = entry.columns.len();
    entry.columns.retain(|c| c.name != column);
    if entry.columns.len() == before {
        return Err(ConnectorError::not_found(format!(
            "column '{}.{}' does not exist",
            table, column
        )));
    }
    Ok(())
}

pub fn upsert_measure(schema: &mut RawSchema, measure: &RawMeasure) -> ConnectorResult<()> {
    if let Some(owner) = measure.table_name.as_deref() {
        if !schema.tables.iter().any(|t| t.name == owner) {
            return Err(ConnectorError::rejected(format!(
                "measure '{}' references unknown table '{}'",
                measure.name, owner
            )));
        }
    }

    match schema.measures.iter_mut().find(|m| m.name == measure.name) {
        Some(existing) => *existing = measure.clone(),
        None => schema.measures.push(measure.clone()),
    }
    Ok(())
}

pub fn drop_measure(schema: &mut RawSchema, name: &str) -> ConnectorResult<()> {
    let before = schema.measures.len();
    schema.measures.retain(|m| m.name != name);
    if schema.measures.len() == before {
        return Err(ConnectorError::not_found(format!(
            "measure '{}' does not exist",
            name
        )));
    }
    Ok(())
}

pub fn upsert_relationship(
    schema: &mut RawSchema,
    relationship: &RawRelationship,
) -> ConnectorResult<()> {
    let key = relationship_key(relationship);
    for (table, column) in [
        (&key.from_table, &key.from_column),
        (&key.to_table, &key.to_column),
    ] {
        let exists = schema
            .tables
            .iter()
            .find(|t| &t.name == table)
            .is_some_and(|t| t.columns.iter().any(|c| &c.name == column));
        if !exists {
            return Err(ConnectorError::rejected(format!(
                "relationship {} references unknown column '{}.{}'",
                key, table, column
            )));
        }
    }

    match schema
        .relationships
        .iter_mut()
        .find(|r| relationship_key(r) == key)
    {
        Some(existing) => *existing = relationship.clone(),
        None => schema.relationships.push(relationship.clone()),
    }
    Ok(())
}

pub fn drop_relationship(schema: &mut RawSchema, key: &RelationshipKey) -> ConnectorResult<()> {
    let before = schema.relationships.len();
    schema.relationships.retain(|r| relationship_key(r) != *key);
    if schema.relationships.len() == before {
        return Err(ConnectorError::not_found(format!(
            "relationship {} does not exist",
            key
        )));
    }
    Ok(())
}
