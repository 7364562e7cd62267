//! Logging and metrics setup for rmevents processes and tests.

pub mod metrics;
pub mod tracing;
