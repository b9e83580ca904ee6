//! Test doubles shared by the engine's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use stagecoach_types::error::StorageError;
use stagecoach_types::stage::{InstanceState, StageResult};

use crate::sync::{InMemorySyncStore, SyncStore};

/// Store operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    GetAll,
    Set,
    Lock,
    Unlock,
}

/// `InMemorySyncStore` wrapper that fails selected operations on demand and
/// counts writes.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: InMemorySyncStore,
    faults: Arc<DashSet<Fault>>,
    sets: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        self.faults.remove(&fault);
    }

    pub fn inner(&self) -> &InMemorySyncStore {
        &self.inner
    }

    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn check(&self, fault: Fault) -> Result<(), StorageError> {
        if self.faults.contains(&fault) {
            Err(StorageError::Connection(format!("injected {fault:?} failure")))
        } else {
            Ok(())
        }
    }
}

impl SyncStore for FaultyStore {
    async fn get_all(&self, id: &str) -> Result<InstanceState, StorageError> {
        self.check(Fault::GetAll)?;
        self.inner.get_all(id).await
    }

    async fn set(
        &self,
        id: &str,
        stage: &str,
        result: &StageResult,
    ) -> Result<Option<StageResult>, StorageError> {
        self.check(Fault::Set)?;
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(id, stage, result).await
    }

    async fn lock(&self, id: &str, stage: &str, lease: Duration) -> Result<bool, StorageError> {
        self.check(Fault::Lock)?;
        self.inner.lock(id, stage, lease).await
    }

    async fn unlock(&self, id: &str, stage: &str) -> Result<(), StorageError> {
        self.check(Fault::Unlock)?;
        self.inner.unlock(id, stage).await
    }
}
