//! SyncStore trait definition.
//!
//! Durable keyed storage of per-instance stage results plus a lease-based
//! exclusive lock keyed by (instance id, stage name). The infrastructure layer
//! (stagecoach-infra) implements this trait with SQLite and filesystem
//! persistence.

use std::time::Duration;

use stagecoach_types::error::StorageError;
use stagecoach_types::stage::{InstanceState, StageResult};

/// Storage and locking port consumed by the workflow engine.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait SyncStore: Send + Sync {
    /// Fetch every persisted stage result for an instance.
    ///
    /// Returns an empty mapping (not an error) when nothing has been recorded
    /// for `id` yet.
    fn get_all(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<InstanceState, StorageError>> + Send;

    /// Fetch a single stage result. Returns None if the stage has no record.
    fn get(
        &self,
        id: &str,
        stage: &str,
    ) -> impl std::future::Future<Output = Result<Option<StageResult>, StorageError>> + Send {
        async move { Ok(self.get_all(id).await?.remove(stage)) }
    }

    /// Merge `result` into the instance's record and write it back durably.
    ///
    /// Other stages' results for the same instance are preserved. A stage
    /// that is already `Done` is never replaced: the write is skipped and the
    /// stored result is returned instead. `Ok(None)` means `result` was
    /// written. The check and the write are one atomic step per instance.
    fn set(
        &self,
        id: &str,
        stage: &str,
        result: &StageResult,
    ) -> impl std::future::Future<Output = Result<Option<StageResult>, StorageError>> + Send;

    /// Try to take the exclusive lease for (id, stage) without blocking.
    ///
    /// `Ok(false)` means another holder currently owns an unexpired lease.
    fn lock(
        &self,
        id: &str,
        stage: &str,
        lease: Duration,
    ) -> impl std::future::Future<Output = Result<bool, StorageError>> + Send;

    /// Release the lease early. Releasing an absent or expired lease is `Ok`.
    fn unlock(
        &self,
        id: &str,
        stage: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}
