//! Persisted stage output.
//!
//! A `StageResult` is what a `SyncStore` keeps for one stage of one workflow
//! instance. The store works with JSON payloads; the engine converts to and
//! from the workflow's own payload type with [`StageResult::encode`] and
//! [`StageResult::decode`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StageStatus
// ---------------------------------------------------------------------------

/// Completion status of a stage for one instance.
///
/// A stage moves from `Pending` to `Done` exactly once and never back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Done,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Done => write!(f, "done"),
        }
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Output of a stage together with its completion status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult<P = serde_json::Value> {
    pub payload: P,
    #[serde(default)]
    pub status: StageStatus,
}

impl<P> StageResult<P> {
    /// A completed result carrying `payload`.
    pub fn done(payload: P) -> Self {
        Self {
            payload,
            status: StageStatus::Done,
        }
    }

    /// A result that has not been completed yet.
    pub fn pending(payload: P) -> Self {
        Self {
            payload,
            status: StageStatus::Pending,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == StageStatus::Done
    }
}

impl StageResult {
    /// Encode a typed result into the JSON form a store persists.
    pub fn encode<P: Serialize>(result: &StageResult<P>) -> Result<Self, serde_json::Error> {
        Ok(StageResult {
            payload: serde_json::to_value(&result.payload)?,
            status: result.status,
        })
    }

    /// Decode the persisted JSON payload into the workflow's payload type.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<StageResult<P>, serde_json::Error> {
        Ok(StageResult {
            payload: serde_json::from_value(self.payload.clone())?,
            status: self.status,
        })
    }
}

/// Synchronized state of one instance: stage name to persisted result.
pub type InstanceState = BTreeMap<String, StageResult>;
