//! Application state: resolved data directory, stage lease and the selected
//! sync backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stagecoach_core::sync::{InMemorySyncStore, SyncStore};
use stagecoach_infra::config::{resolve_lease, sync_root};
use stagecoach_infra::filesystem::FileSyncStore;
use stagecoach_infra::sqlite::{DatabasePool, SqliteSyncStore};
use stagecoach_types::config::{BackendKind, EngineConfig};
use stagecoach_types::error::StorageError;
use stagecoach_types::stage::{InstanceState, StageResult};

/// The backend chosen at startup. Delegates every `SyncStore` call to the
/// concrete store, so workflows are built once over this single type.
#[derive(Clone)]
pub enum SyncBackend {
    Sqlite(SqliteSyncStore),
    File(FileSyncStore),
    Memory(InMemorySyncStore),
}

impl SyncBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            SyncBackend::Sqlite(_) => BackendKind::Sqlite,
            SyncBackend::File(_) => BackendKind::File,
            SyncBackend::Memory(_) => BackendKind::Memory,
        }
    }
}

impl SyncStore for SyncBackend {
    async fn get_all(&self, id: &str) -> Result<InstanceState, StorageError> {
        match self {
            SyncBackend::Sqlite(s) => s.get_all(id).await,
            SyncBackend::File(s) => s.get_all(id).await,
            SyncBackend::Memory(s) => s.get_all(id).await,
        }
    }

    async fn set(
        &self,
        id: &str,
        stage: &str,
        result: &StageResult,
    ) -> Result<Option<StageResult>, StorageError> {
        match self {
            SyncBackend::Sqlite(s) => s.set(id, stage, result).await,
            SyncBackend::File(s) => s.set(id, stage, result).await,
            SyncBackend::Memory(s) => s.set(id, stage, result).await,
        }
    }

    async fn lock(&self, id: &str, stage: &str, lease: Duration) -> Result<bool, StorageError> {
        match self {
            SyncBackend::Sqlite(s) => s.lock(id, stage, lease).await,
            SyncBackend::File(s) => s.lock(id, stage, lease).await,
            SyncBackend::Memory(s) => s.lock(id, stage, lease).await,
        }
    }

    async fn unlock(&self, id: &str, stage: &str) -> Result<(), StorageError> {
        match self {
            SyncBackend::Sqlite(s) => s.unlock(id, stage).await,
            SyncBackend::File(s) => s.unlock(id, stage).await,
            SyncBackend::Memory(s) => s.unlock(id, stage).await,
        }
    }
}

/// Shared state for CLI commands.
pub struct AppState {
    pub data_dir: PathBuf,
    pub store: Arc<SyncBackend>,
    /// Lease applied to every demo stage.
    pub lease: Duration,
}

impl AppState {
    /// Open the configured backend. Flag overrides win over `config.toml`.
    pub async fn init(
        data_dir: PathBuf,
        config: &EngineConfig,
        backend_override: Option<BackendKind>,
        lease_override: Option<u64>,
    ) -> anyhow::Result<Self> {
        let backend = backend_override.unwrap_or(config.backend);
        let lease = resolve_lease(config, lease_override);

        let store = match backend {
            BackendKind::Sqlite => {
                let pool = DatabasePool::open(&data_dir, &config.database_file)
                    .await
                    .with_context(|| {
                        format!(
                            "failed to open database {}",
                            data_dir.join(&config.database_file).display()
                        )
                    })?;
                let store = SqliteSyncStore::new(pool);
                match store.prune_expired_leases().await {
                    Ok(pruned) => tracing::debug!(pruned, "pruned expired stage leases"),
                    Err(e) => tracing::warn!(error = %e, "failed to prune expired stage leases"),
                }
                SyncBackend::Sqlite(store)
            }
            BackendKind::File => SyncBackend::File(FileSyncStore::new(sync_root(&data_dir, config))),
            BackendKind::Memory => SyncBackend::Memory(InMemorySyncStore::new()),
        };

        tracing::info!(
            backend = %backend,
            data_dir = %data_dir.display(),
            lease_ms = lease.as_millis() as u64,
            "initialized sync backend"
        );

        Ok(Self {
            data_dir,
            store: Arc::new(store),
            lease,
        })
    }
}
