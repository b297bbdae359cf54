//! Tracing and metrics setup shared by roster binaries and tests.

pub mod metrics;
pub mod tracing;
