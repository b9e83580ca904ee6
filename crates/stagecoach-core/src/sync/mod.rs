//! Synchronized-state abstractions.
//!
//! Defines the `SyncStore` trait, the storage key layout shared by every
//! backend, and an in-process reference store. Durable implementations live
//! in stagecoach-infra.

pub mod keys;
pub mod memory;
pub mod store;

pub use memory::InMemorySyncStore;
pub use store::SyncStore;
