//! Filesystem adapters for Stagecoach.
//!
//! Provides the file-backed `SyncStore` and data directory resolution.

pub mod sync;

use std::path::PathBuf;

pub use sync::FileSyncStore;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "STAGECOACH_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `STAGECOACH_DATA_DIR` environment variable
/// 2. `~/.stagecoach`
/// 3. `./.stagecoach` when no home directory is known
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".stagecoach");
    }

    PathBuf::from(".stagecoach")
}

/// Encode an id or stage name into a single safe path component.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`. The mapping is injective, so distinct names never share a file.
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    if out.is_empty() {
        out.push('%');
    }
    out
}
