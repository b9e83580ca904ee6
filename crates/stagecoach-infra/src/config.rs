//! Engine configuration loader for Stagecoach.
//!
//! Reads `config.toml` from the data directory (`~/.stagecoach/` in production)
//! and deserializes it into [`EngineConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use stagecoach_types::config::EngineConfig;

/// Shortest lease accepted from configuration or flags.
const MIN_LEASE_SECS: u64 = 1;

/// File name of the engine configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Location of the engine configuration for `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load the engine configuration from [`config_path`].
///
/// A missing file yields [`EngineConfig::default()`]. So does a file that
/// cannot be read or parsed, after a warning naming the file and the cause.
/// Fields absent from the file keep their defaults.
pub async fn load_config(data_dir: &Path) -> EngineConfig {
    let path = config_path(data_dir);

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                path = %path.display(),
                "no stagecoach config file, using default backend and lease"
            );
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "cannot read stagecoach config file, using default backend and lease"
            );
            return EngineConfig::default();
        }
    };

    let config = match toml::from_str::<EngineConfig>(&raw) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "invalid stagecoach config (expected backend, default_lease_secs, \
                 database_file, sync_dir, log_format), using defaults"
            );
            return EngineConfig::default();
        }
    };

    if config.default_lease_secs < MIN_LEASE_SECS {
        tracing::warn!(
            path = %path.display(),
            default_lease_secs = config.default_lease_secs,
            min_lease_secs = MIN_LEASE_SECS,
            "default_lease_secs below minimum, stages will use the minimum lease"
        );
    }
    tracing::debug!(
        path = %path.display(),
        backend = %config.backend,
        default_lease_secs = config.default_lease_secs,
        sync_dir = config.sync_dir.as_str(),
        "loaded stagecoach config"
    );
    config
}

/// Resolve the default stage lease.
///
/// A command-line override wins over `default_lease_secs`; either way the
/// lease is at least one second.
pub fn resolve_lease(config: &EngineConfig, cli_override: Option<u64>) -> Duration {
    let secs = cli_override.unwrap_or(config.default_lease_secs);
    Duration::from_secs(secs.max(MIN_LEASE_SECS))
}

/// Root directory of the file store.
pub fn sync_root(data_dir: &Path, config: &EngineConfig) -> PathBuf {
    data_dir.join(&config.sync_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecoach_types::config::{BackendKind, LogFormat};
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.default_lease_secs, 30);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
backend = "file"
default_lease_secs = 10
sync_dir = "workflows"
log_format = "json"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.default_lease_secs, 10);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(sync_root(tmp.path(), &config), tmp.path().join("workflows"));
    }

    #[tokio::test]
    async fn load_config_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(config_path(tmp.path()), "default_lease_secs = 0\n")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.default_lease_secs, 0);
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.sync_dir, EngineConfig::default().sync_dir);
        assert_eq!(resolve_lease(&config, None), Duration::from_secs(MIN_LEASE_SECS));
    }

    #[test]
    fn config_path_is_inside_data_dir() {
        let dir = Path::new("/var/lib/stagecoach");
        assert_eq!(config_path(dir), dir.join("config.toml"));
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "backend = [oops")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.backend, BackendKind::Sqlite);
    }

    #[tokio::test]
    async fn load_config_unknown_backend_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "backend = \"redis\"")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.backend, BackendKind::Sqlite);
    }

    #[test]
    fn resolve_lease_prefers_override() {
        let config = EngineConfig::default();
        assert_eq!(resolve_lease(&config, Some(5)), Duration::from_secs(5));
        assert_eq!(resolve_lease(&config, None), Duration::from_secs(30));
    }

    #[test]
    fn resolve_lease_enforces_floor() {
        let config = EngineConfig {
            default_lease_secs: 0,
            ..EngineConfig::default()
        };
        assert_eq!(resolve_lease(&config, None), Duration::from_secs(1));
        assert_eq!(resolve_lease(&config, Some(0)), Duration::from_secs(1));
    }
}
