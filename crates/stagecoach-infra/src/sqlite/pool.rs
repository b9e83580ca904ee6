//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. Every state mutation of the sync
//! store (record merges, lease upserts) goes through the single-connection
//! writer pool, which serializes them; lookups use the reader pool.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::filesystem::resolve_data_dir;

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (up to 8) for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Connect both pools and run the `sync_entries` migration on the writer.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts)
            .await?;

        // The reader pool is read-only and cannot create the schema.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        tracing::debug!(url = database_url, "opened sqlite sync database");

        Ok(Self { reader, writer })
    }

    /// Open `{data_dir}/{database_file}`, creating the data directory first.
    pub async fn open(data_dir: &Path, database_file: &str) -> Result<Self, sqlx::Error> {
        tokio::fs::create_dir_all(data_dir).await?;
        Self::new(&database_url(data_dir, database_file)).await
    }
}

/// SQLite URL for a database file inside `data_dir`.
pub fn database_url(data_dir: &Path, database_file: &str) -> String {
    format!(
        "sqlite://{}?mode=rwc",
        data_dir.join(database_file).display()
    )
}

/// Default URL: `stagecoach.db` in the resolved data directory.
pub fn default_database_url() -> String {
    database_url(&resolve_data_dir(), "stagecoach.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_creates_sync_table() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path(), "test.db"))
            .await
            .unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(table_names, vec!["sync_entries"]);
    }

    #[tokio::test]
    async fn test_pool_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path(), "test_wal.db"))
            .await
            .unwrap();

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();

        assert_eq!(result.0.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_open_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("state");

        DatabasePool::open(&data_dir, "sync.db").await.unwrap();
        assert!(data_dir.join("sync.db").exists());
    }

    #[test]
    fn test_database_url_format() {
        let url = database_url(Path::new("/var/lib/stagecoach"), "stagecoach.db");
        assert_eq!(url, "sqlite:///var/lib/stagecoach/stagecoach.db?mode=rwc");
    }

    #[test]
    fn test_default_database_url() {
        let url = default_database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("stagecoach.db?mode=rwc"));
    }
}
