//! File-backed sync store.
//!
//! Layout under the store root:
//!
//! ```text
//! data/{id}.json             instance record (stage name -> result)
//! lock/{id}/{stage}.lease    stage lease: {"holder": .., "expires_at_ms": ..}
//! ```
//!
//! Ids and stage names are escaped with [`encode_component`]. Records are
//! replaced atomically by writing a temp file and renaming it over the old
//! one. A lease is taken by exclusively creating its file. A lease file that
//! cannot be parsed is respected for [`UNREADABLE_LEASE_GRACE`] after its last
//! modification and removed after that.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stagecoach_core::sync::SyncStore;
use stagecoach_types::error::StorageError;
use stagecoach_types::stage::{InstanceState, StageResult};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::encode_component;

/// How long an unparseable lease file is treated as held. Covers a creator
/// that has opened the file but not yet written its body; a file older than
/// this was left behind by a writer that died mid-write.
pub const UNREADABLE_LEASE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct LeaseFile {
    holder: String,
    expires_at_ms: i64,
}

impl LeaseFile {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Outcome of reading an existing lease file.
enum LeaseState {
    Missing,
    Unreadable,
    Present(LeaseFile),
}

/// Filesystem implementation of `SyncStore`.
#[derive(Clone)]
pub struct FileSyncStore {
    root: PathBuf,
    holder: String,
    /// Serializes this store's record rewrites.
    write_guard: Arc<Mutex<()>>,
}

impl FileSyncStore {
    /// Create a store rooted at `root` with a fresh holder token. Directories
    /// are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_holder(root, Uuid::now_v7().to_string())
    }

    pub fn with_holder(root: impl Into<PathBuf>, holder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            holder: holder.into(),
            write_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Path of the instance record for `id`.
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.root
            .join("data")
            .join(format!("{}.json", encode_component(id)))
    }

    /// Path of the lease file for (`id`, `stage`).
    pub fn lease_path(&self, id: &str, stage: &str) -> PathBuf {
        self.root
            .join("lock")
            .join(encode_component(id))
            .join(format!("{}.lease", encode_component(stage)))
    }

    async fn read_record(&self, path: &Path) -> Result<InstanceState, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                StorageError::Codec(format!("invalid record {}: {e}", path.display()))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(InstanceState::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_lease(path: &Path) -> Result<LeaseState, StorageError> {
        match tokio::fs::read(path).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)
                .map(LeaseState::Present)
                .unwrap_or(LeaseState::Unreadable)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(LeaseState::Missing),
            Err(err) => Err(err.into()),
        }
    }

    /// Exclusively create the lease file. `Ok(false)` if it already exists.
    async fn create_lease(&self, path: &Path, lease: &LeaseFile) -> Result<bool, StorageError> {
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let body = serde_json::to_vec(lease)?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        Ok(true)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn lease_ms(lease: Duration) -> i64 {
    i64::try_from(lease.as_millis()).unwrap_or(i64::MAX)
}

/// Whether an unparseable lease file has outlived [`UNREADABLE_LEASE_GRACE`].
/// A file that vanished in the meantime counts as stale.
async fn is_stale_unreadable(path: &Path) -> Result<bool, StorageError> {
    let modified = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified()?,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(err.into()),
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    Ok(age >= UNREADABLE_LEASE_GRACE)
}

async fn remove_if_present(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

impl SyncStore for FileSyncStore {
    async fn get_all(&self, id: &str) -> Result<InstanceState, StorageError> {
        self.read_record(&self.record_path(id)).await
    }

    async fn set(
        &self,
        id: &str,
        stage: &str,
        result: &StageResult,
    ) -> Result<Option<StageResult>, StorageError> {
        let _guard = self.write_guard.lock().await;
        let path = self.record_path(id);

        let mut record = self.read_record(&path).await?;
        if let Some(kept) = record.get(stage).filter(|r| r.is_done()) {
            return Ok(Some(kept.clone()));
        }
        record.insert(stage.to_string(), result.clone());
        let body = serde_json::to_vec_pretty(&record)?;

        let dir = self.root.join("data");
        tokio::fs::create_dir_all(&dir).await?;
        let tmp = dir.join(format!(".{}.{}.tmp", encode_component(id), self.holder));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            instance_id = id,
            stage,
            path = %path.display(),
            "persisted stage result"
        );
        Ok(None)
    }

    async fn lock(&self, id: &str, stage: &str, lease: Duration) -> Result<bool, StorageError> {
        let path = self.lease_path(id, stage);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let now = now_ms();
        let wanted = LeaseFile {
            holder: self.holder.clone(),
            expires_at_ms: now.saturating_add(lease_ms(lease)),
        };

        if self.create_lease(&path, &wanted).await? {
            return Ok(true);
        }

        match Self::read_lease(&path).await? {
            // Released between the create attempt and the read.
            LeaseState::Missing => self.create_lease(&path, &wanted).await,
            LeaseState::Present(existing) if existing.is_expired(now) => {
                tracing::debug!(
                    instance_id = id,
                    stage,
                    previous_holder = existing.holder.as_str(),
                    "taking over expired lease"
                );
                remove_if_present(&path).await?;
                self.create_lease(&path, &wanted).await
            }
            LeaseState::Present(_) => Ok(false),
            LeaseState::Unreadable if is_stale_unreadable(&path).await? => {
                tracing::warn!(
                    instance_id = id,
                    stage,
                    path = %path.display(),
                    "removing stale unreadable lease file"
                );
                remove_if_present(&path).await?;
                self.create_lease(&path, &wanted).await
            }
            // Possibly a lease still being written by its creator.
            LeaseState::Unreadable => {
                tracing::warn!(
                    instance_id = id,
                    stage,
                    path = %path.display(),
                    "unreadable lease file, treating stage as locked"
                );
                Ok(false)
            }
        }
    }

    async fn unlock(&self, id: &str, stage: &str) -> Result<(), StorageError> {
        let path = self.lease_path(id, stage);
        match Self::read_lease(&path).await? {
            LeaseState::Present(existing)
                if existing.holder == self.holder || existing.is_expired(now_ms()) =>
            {
                remove_if_present(&path).await
            }
            LeaseState::Unreadable if is_stale_unreadable(&path).await? => {
                remove_if_present(&path).await
            }
            _ => Ok(()),
        }
    }
}
