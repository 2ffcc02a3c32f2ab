//! Logging and metrics initialization shared by the docsync binaries and tests.

pub mod metrics;
pub mod tracing;
