//! Canonical model shared by the normalizer, detector, applier and snapshot store

pub mod data_type;
pub mod types;

pub use data_type::{DataType, Dialect, UnknownNativeType, FABRIC_TYPES, SNOWFLAKE_TYPES};
pub use types::{
    Cardinality, CrossFilter, RelationshipKey, SemanticColumn, SemanticMeasure, SemanticModel,
    SemanticRelationship, SemanticTable,
};
