use thiserror::Error;

/// Errors from `SyncStore` backends (used by the trait in stagecoach-core).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unreachable: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("cannot encode or decode stage data: {0}")]
    Codec(String),

    #[error("filesystem error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
