pub mod history;
pub mod snapshot;
pub mod sync;
