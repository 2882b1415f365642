//! Change detection between two canonical models

pub mod change;
pub mod detector;

pub use change::{
    COSMETIC_FIELDS, Change, ChangeKey, ChangeSet, ChangeSummary, EntityKind, EntityValue,
    Operation,
};
pub use detector::{
    DiffOptions, SyncMode, column_changed_fields, diff, is_satisfied, measure_changed_fields,
    relationship_changed_fields, table_changed_fields,
};
