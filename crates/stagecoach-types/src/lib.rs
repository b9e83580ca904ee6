//! Shared domain types for Stagecoach.
//!
//! This crate holds the data that crosses the storage boundary: the persisted
//! per-stage result record, the run status reported to callers, the storage
//! error type used by every `SyncStore` backend, and the engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod run;
pub mod stage;
