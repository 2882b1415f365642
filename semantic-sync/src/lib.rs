//! Change detection, apply and snapshot rollback for tabular semantic models
//!
//! A source store (e.g. a warehouse) and a target store (e.g. a BI model)
//! are read into one canonical model, compared, and the target is brought in
//! line change by change. Snapshots of a model can be captured and restored.

pub mod apply;
pub mod config;
pub mod connector;
pub mod diff;
pub mod error;
pub mod model;
pub mod normalize;
pub mod repository;
pub mod resilience;
pub mod snapshot;
pub mod sync;

pub use error::{SyncError, SyncResult};
