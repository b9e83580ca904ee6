//! SQLite storage layer.
//!
//! `SyncStore` implementation backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod pool;
pub mod sync;

pub use pool::DatabasePool;
pub use sync::SqliteSyncStore;
