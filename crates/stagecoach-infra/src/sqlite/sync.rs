//! SQLite sync store implementation.
//!
//! Implements `SyncStore` from `stagecoach-core` on the `sync_entries` table.
//! Instance records are JSON objects stored under `data:{id}`; stage leases
//! are rows under `lock:..` carrying the holder token and an epoch-ms expiry.

use std::time::Duration;

use chrono::Utc;
use sqlx::Row;
use stagecoach_core::sync::keys::{data_key, lock_key, LOCK_PREFIX};
use stagecoach_core::sync::SyncStore;
use stagecoach_types::error::StorageError;
use stagecoach_types::stage::{InstanceState, StageResult};
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SyncStore`.
///
/// Each store instance has its own holder token, so two processes (or two
/// stores in one process) sharing a database never release each other's
/// leases.
#[derive(Clone)]
pub struct SqliteSyncStore {
    pool: DatabasePool,
    holder: String,
}

impl SqliteSyncStore {
    /// Create a store with a fresh holder token.
    pub fn new(pool: DatabasePool) -> Self {
        Self::with_holder(pool, Uuid::now_v7().to_string())
    }

    /// Create a store that takes leases as `holder`.
    pub fn with_holder(pool: DatabasePool, holder: impl Into<String>) -> Self {
        Self {
            pool,
            holder: holder.into(),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Delete every lease row whose expiry has passed. Returns the number of
    /// rows removed.
    pub async fn prune_expired_leases(&self) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "DELETE FROM sync_entries WHERE key LIKE ? AND expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(format!("{LOCK_PREFIX}%"))
        .bind(now_ms())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn lease_ms(lease: Duration) -> i64 {
    i64::try_from(lease.as_millis()).unwrap_or(i64::MAX)
}

fn decode_record(key: &str, raw: &str) -> Result<InstanceState, StorageError> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Codec(format!("invalid record under '{key}': {e}")))
}

// ---------------------------------------------------------------------------
// SyncStore implementation
// ---------------------------------------------------------------------------

impl SyncStore for SqliteSyncStore {
    async fn get_all(&self, id: &str) -> Result<InstanceState, StorageError> {
        let key = data_key(id);
        let row = sqlx::query("SELECT value FROM sync_entries WHERE key = ?")
            .bind(&key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("value")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                decode_record(&key, &raw)
            }
            None => Ok(InstanceState::new()),
        }
    }

    async fn set(
        &self,
        id: &str,
        stage: &str,
        result: &StageResult,
    ) -> Result<Option<StageResult>, StorageError> {
        let key = data_key(id);
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_entries WHERE key = ?")
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;

        let mut record = match existing {
            Some(raw) => decode_record(&key, &raw)?,
            None => InstanceState::new(),
        };
        if let Some(kept) = record.get(stage).filter(|r| r.is_done()) {
            // Dropping the transaction rolls it back.
            return Ok(Some(kept.clone()));
        }
        record.insert(stage.to_string(), result.clone());
        let value = serde_json::to_string(&record)?;

        sqlx::query(
            r#"INSERT INTO sync_entries (key, value, expires_at, updated_at)
               VALUES (?, ?, NULL, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(&key)
        .bind(&value)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        tracing::debug!(instance_id = id, stage, "persisted stage result");
        Ok(None)
    }

    async fn lock(&self, id: &str, stage: &str, lease: Duration) -> Result<bool, StorageError> {
        let now = now_ms();
        let expires_at = now.saturating_add(lease_ms(lease));

        // The update branch only fires when the current lease has expired.
        let result = sqlx::query(
            r#"INSERT INTO sync_entries (key, value, expires_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET
                   value = excluded.value,
                   expires_at = excluded.expires_at,
                   updated_at = excluded.updated_at
               WHERE sync_entries.expires_at IS NOT NULL AND sync_entries.expires_at <= ?"#,
        )
        .bind(lock_key(id, stage))
        .bind(&self.holder)
        .bind(expires_at)
        .bind(Utc::now().to_rfc3339())
        .bind(now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlock(&self, id: &str, stage: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sync_entries WHERE key = ? AND (value = ? OR expires_at <= ?)")
            .bind(lock_key(id, stage))
            .bind(&self.holder)
            .bind(now_ms())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::{database_url, DatabasePool};
    use serde_json::json;
    use stagecoach_core::workflow::{HandlerError, WorkflowDefinition};
    use stagecoach_types::run::RunStatus;
    use std::sync::Arc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path(), "test.db");
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_all_unknown_instance_is_empty() {
        let store = SqliteSyncStore::new(test_pool().await);
        assert!(store.get_all("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_merges_stage_results() {
        let store = SqliteSyncStore::new(test_pool().await);

        store
            .set("id-1", "first", &StageResult::done(json!("a")))
            .await
            .unwrap();
        store
            .set("id-1", "second", &StageResult::done(json!({"n": 2})))
            .await
            .unwrap();

        let state = store.get_all("id-1").await.unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state["first"].payload, json!("a"));
        assert_eq!(state["second"].payload, json!({"n": 2}));
        assert!(state.values().all(|r| r.is_done()));
    }

    #[tokio::test]
    async fn test_set_keeps_existing_done_result() {
        let pool = test_pool().await;
        let a = SqliteSyncStore::new(pool.clone());
        let b = SqliteSyncStore::new(pool);

        assert!(a
            .set("id-1", "first", &StageResult::done(json!("winner")))
            .await
            .unwrap()
            .is_none());
        let kept = b
            .set("id-1", "first", &StageResult::done(json!("late")))
            .await
            .unwrap();

        assert_eq!(kept.map(|r| r.payload), Some(json!("winner")));
        assert_eq!(
            a.get("id-1", "first").await.unwrap().unwrap().payload,
            json!("winner")
        );

        // The refused write left the writer usable.
        b.set("id-1", "second", &StageResult::done(json!(2)))
            .await
            .unwrap();
        assert_eq!(a.get_all("id-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_single_stage() {
        let store = SqliteSyncStore::new(test_pool().await);
        store
            .set("id-1", "first", &StageResult::done(json!(1)))
            .await
            .unwrap();

        assert_eq!(
            store.get("id-1", "first").await.unwrap().unwrap().payload,
            json!(1)
        );
        assert!(store.get("id-1", "second").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_unlocked() {
        let store = SqliteSyncStore::new(test_pool().await);
        let lease = Duration::from_secs(30);

        assert!(store.lock("id-1", "first", lease).await.unwrap());
        assert!(!store.lock("id-1", "first", lease).await.unwrap());
        // Other stages and instances are independent.
        assert!(store.lock("id-1", "second", lease).await.unwrap());
        assert!(store.lock("id-2", "first", lease).await.unwrap());

        store.unlock("id-1", "first").await.unwrap();
        assert!(store.lock("id-1", "first", lease).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let pool = test_pool().await;
        let a = SqliteSyncStore::with_holder(pool.clone(), "holder-a");
        let b = SqliteSyncStore::with_holder(pool, "holder-b");

        assert!(a.lock("id-1", "first", Duration::ZERO).await.unwrap());
        assert!(b.lock("id-1", "first", Duration::from_secs(30)).await.unwrap());

        let holder: String = sqlx::query_scalar("SELECT value FROM sync_entries WHERE key = ?")
            .bind(lock_key("id-1", "first"))
            .fetch_one(&b.pool().reader)
            .await
            .unwrap();
        assert_eq!(holder, "holder-b");
    }

    #[tokio::test]
    async fn test_unlock_leaves_foreign_lease_alone() {
        let pool = test_pool().await;
        let owner = SqliteSyncStore::new(pool.clone());
        let other = SqliteSyncStore::new(pool);
        let lease = Duration::from_secs(30);

        assert!(owner.lock("id-1", "first", lease).await.unwrap());
        other.unlock("id-1", "first").await.unwrap();
        assert!(!other.lock("id-1", "first", lease).await.unwrap());

        owner.unlock("id-1", "first").await.unwrap();
        assert!(other.lock("id-1", "first", lease).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_absent_lease_is_ok() {
        let store = SqliteSyncStore::new(test_pool().await);
        store.unlock("id-1", "never-locked").await.unwrap();
    }

    #[tokio::test]
    async fn test_lease_never_touches_instance_record() {
        let store = SqliteSyncStore::new(test_pool().await);
        store
            .set("id-1", "first", &StageResult::done(json!("kept")))
            .await
            .unwrap();

        assert!(store.lock("id-1", "first", Duration::from_secs(5)).await.unwrap());
        store.unlock("id-1", "first").await.unwrap();

        let state = store.get_all("id-1").await.unwrap();
        assert_eq!(state["first"].payload, json!("kept"));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_codec_error() {
        let store = SqliteSyncStore::new(test_pool().await);
        sqlx::query(
            "INSERT INTO sync_entries (key, value, expires_at, updated_at) VALUES (?, ?, NULL, ?)",
        )
        .bind(data_key("id-1"))
        .bind("{not json")
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool().writer)
        .await
        .unwrap();

        let err = store.get_all("id-1").await.unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));

        // A write must not silently replace the unreadable record either.
        let err = store
            .set("id-1", "first", &StageResult::done(json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
    }

    #[tokio::test]
    async fn test_prune_expired_leases() {
        let store = SqliteSyncStore::new(test_pool().await);
        assert!(store.lock("id-1", "first", Duration::ZERO).await.unwrap());
        assert!(store.lock("id-1", "second", Duration::from_secs(60)).await.unwrap());
        store
            .set("id-1", "first", &StageResult::done(json!(1)))
            .await
            .unwrap();

        assert_eq!(store.prune_expired_leases().await.unwrap(), 1);
        assert_eq!(store.get_all("id-1").await.unwrap().len(), 1);
        assert!(!store.lock("id-1", "second", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_workflow_resumes_from_database_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path(), "resume.db");

        let build = |store: Arc<SqliteSyncStore>, bookmark_at: &'static str| {
            let mut builder = WorkflowDefinition::builder("append", store);
            for name in ["first", "second", "third"] {
                builder = builder.then(name, Duration::from_secs(5), move |rw, input: String, _| {
                    async move {
                        let next = format!("{input}-{name}");
                        if name == bookmark_at {
                            rw.bookmark(next);
                        } else {
                            rw.set(next);
                        }
                        Ok::<(), HandlerError>(())
                    }
                });
            }
            builder.build().unwrap()
        };

        {
            let store = Arc::new(SqliteSyncStore::new(DatabasePool::new(&url).await.unwrap()));
            let outcome = build(store, "first")
                .run("id-1", "seed".to_string())
                .await
                .unwrap();
            assert_eq!(outcome.status, RunStatus::Suspended);
            assert_eq!(outcome.payload, "seed-first");
        }

        let store = Arc::new(SqliteSyncStore::new(DatabasePool::new(&url).await.unwrap()));
        let outcome = build(store, "none")
            .run("id-1", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.payload, "seed-first-second-third");
        assert_eq!(outcome.resumed, vec!["first"]);
        assert_eq!(outcome.executed, vec!["second", "third"]);
    }
}
