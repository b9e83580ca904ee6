//! In-process implementation of `SyncStore`.
//!
//! Keeps instance records and leases in `DashMap`s keyed by the shared key
//! layout. Record merges and lease acquisition are atomic per key, which is
//! all the engine needs from a backend. State does not survive the process.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use stagecoach_types::error::StorageError;
use stagecoach_types::stage::{InstanceState, StageResult};
use tokio::time::Instant;

use super::keys;
use super::store::SyncStore;

/// Leases far in the future are clamped to this horizon.
const MAX_LEASE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Thread-safe `SyncStore` held entirely in memory.
///
/// Cloning is cheap and clones share the same state.
#[derive(Clone, Default)]
pub struct InMemorySyncStore {
    records: Arc<DashMap<String, InstanceState>>,
    leases: Arc<DashMap<String, Instant>>,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an unexpired lease is currently held for (id, stage).
    pub fn is_locked(&self, id: &str, stage: &str) -> bool {
        self.leases
            .get(&keys::lock_key(id, stage))
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }

    /// Number of instances with a persisted record.
    pub fn instance_count(&self) -> usize {
        self.records.len()
    }
}

impl SyncStore for InMemorySyncStore {
    async fn get_all(&self, id: &str) -> Result<InstanceState, StorageError> {
        Ok(self
            .records
            .get(&keys::data_key(id))
            .map(|state| state.value().clone())
            .unwrap_or_default())
    }

    async fn set(
        &self,
        id: &str,
        stage: &str,
        result: &StageResult,
    ) -> Result<Option<StageResult>, StorageError> {
        let mut record = self.records.entry(keys::data_key(id)).or_default();
        if let Some(kept) = record.get(stage).filter(|r| r.is_done()) {
            return Ok(Some(kept.clone()));
        }
        record.insert(stage.to_string(), result.clone());
        Ok(None)
    }

    async fn lock(&self, id: &str, stage: &str, lease: Duration) -> Result<bool, StorageError> {
        let now = Instant::now();
        let expires_at = now + lease.min(MAX_LEASE);

        match self.leases.entry(keys::lock_key(id, stage)) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    return Ok(false);
                }
                held.insert(expires_at);
                Ok(true)
            }
            Entry::Vacant(free) => {
                free.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn unlock(&self, id: &str, stage: &str) -> Result<(), StorageError> {
        self.leases.remove(&keys::lock_key(id, stage));
        Ok(())
    }
}
