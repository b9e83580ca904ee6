//! Engine configuration types.
//!
//! `EngineConfig` represents the `config.toml` in the data directory that
//! selects the sync backend, the default lease and the log format.

use serde::{Deserialize, Serialize};

/// Which `SyncStore` implementation backs workflow state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// SQLite database in the data directory.
    #[default]
    Sqlite,
    /// JSON record files and lease files under `sync_dir`.
    File,
    /// Process-local store; state is lost at exit.
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "file" => Ok(BackendKind::File),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown backend '{other}' (expected sqlite, file or memory)")),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Top-level configuration. All fields have defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Lease duration for stages added without an explicit lease.
    #[serde(default = "default_lease_secs")]
    pub default_lease_secs: u64,

    /// SQLite file name, relative to the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// File-store root, relative to the data directory.
    #[serde(default = "default_sync_dir")]
    pub sync_dir: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_lease_secs() -> u64 {
    30
}

fn default_database_file() -> String {
    "stagecoach.db".to_string()
}

fn default_sync_dir() -> String {
    "sync".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            default_lease_secs: default_lease_secs(),
            database_file: default_database_file(),
            sync_dir: default_sync_dir(),
            log_format: LogFormat::default(),
        }
    }
}
