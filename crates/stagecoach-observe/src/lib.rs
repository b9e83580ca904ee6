//! Observability setup for Stagecoach binaries.

pub mod tracing_setup;
