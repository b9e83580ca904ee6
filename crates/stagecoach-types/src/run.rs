//! Run-level status reported to callers.

use serde::{Deserialize, Serialize};

/// How a successful `run` call ended.
///
/// A failed run is reported through the error branch instead; the instance's
/// persisted state is left as last written and the call can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage of the definition is `Done`.
    Completed,
    /// A stage requested a bookmark; later stages are still pending.
    Suspended,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Suspended => write!(f, "suspended"),
        }
    }
}
