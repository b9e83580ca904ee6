//! Infrastructure layer for Stagecoach.
//!
//! Contains implementations of the `SyncStore` trait defined in
//! `stagecoach-core`: SQLite storage with split reader/writer pools, a
//! filesystem store of JSON record files and lease files, and the
//! `config.toml` loader.

pub mod config;
pub mod filesystem;
pub mod sqlite;
