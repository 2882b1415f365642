//! Resilience for read-only connector calls

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
