//! Sync runs: state machine, audit record, run locks and the orchestrator

mod lock;
mod orchestrator;
mod run;
mod state;

pub use lock::{RunGuard, RunLocks};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncRequest};
pub use run::SyncRun;
pub use state::SyncState;
