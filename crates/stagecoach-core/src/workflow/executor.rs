//! Resumable run loop over a workflow definition.
//!
//! Each `run` call walks the stages strictly in definition order:
//!
//! 1. Fetch the instance's synchronized state (empty for a new id).
//! 2. For each stage, adopt a persisted `Done` result without locking or
//!    invoking anything; otherwise execute the stage cycle with the previous
//!    stage's payload (the seed for the first stage) as input.
//! 3. Stop at the first error, or right after a stage that requested a
//!    bookmark.
//!
//! Because a stage only executes once every earlier stage is `Done`, results
//! become `Done` in definition order across any number of calls, and calling
//! `run` again after a failure, crash or bookmark resumes at the first stage
//! that is still pending.

use stagecoach_types::run::RunStatus;
use stagecoach_types::stage::{StageResult, StageStatus};

use crate::sync::SyncStore;

use super::definition::WorkflowDefinition;
use super::error::{RunError, StageError};
use super::Payload;

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// Result of a successful (completed or suspended) run call.
#[derive(Debug, Clone)]
pub struct RunOutcome<P> {
    pub instance_id: String,
    pub status: RunStatus,
    /// Payload of the last stage result produced or adopted; the seed when
    /// the definition has no stages.
    pub payload: P,
    /// Stages whose handlers ran during this call.
    pub executed: Vec<String>,
    /// Stages whose persisted `Done` results were adopted.
    pub resumed: Vec<String>,
}

impl<P> RunOutcome<P> {
    /// The final payload of this run.
    pub fn result(&self) -> &P {
        &self.payload
    }

    pub fn into_result(self) -> P {
        self.payload
    }

    pub fn is_suspended(&self) -> bool {
        self.status == RunStatus::Suspended
    }
}

/// Persisted state of one defined stage, as reported by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    pub payload: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

impl<P: Payload, S: SyncStore> WorkflowDefinition<P, S> {
    /// Drive instance `id` forward from its persisted state.
    ///
    /// `seed` is the first stage's input and is handed unchanged to every
    /// handler. Errors are returned as-is with the failing stage and instance;
    /// nothing is retried. Calling `run` again is always safe.
    pub async fn run(&self, id: &str, seed: P) -> Result<RunOutcome<P>, RunError> {
        let synced = self
            .store
            .get_all(id)
            .await
            .map_err(|source| RunError::Fetch {
                instance_id: id.to_string(),
                source,
            })?;

        tracing::info!(
            instance_id = id,
            workflow = self.name.as_str(),
            stages = self.stages.len(),
            already_done = synced.values().filter(|r| r.is_done()).count(),
            "starting workflow run"
        );

        let mut payload = seed.clone();
        let mut executed = Vec::new();
        let mut resumed = Vec::new();
        let mut status = RunStatus::Completed;

        for (idx, stage) in self.stages.iter().enumerate() {
            let stage_error = |source: StageError| RunError::Stage {
                instance_id: id.to_string(),
                stage: stage.name().to_string(),
                source,
            };

            if let Some(persisted) = synced.get(stage.name()).filter(|r| r.is_done()) {
                let adopted: StageResult<P> = persisted
                    .decode()
                    .map_err(|e| stage_error(StageError::Codec(e.to_string())))?;

                tracing::debug!(
                    instance_id = id,
                    stage = stage.name(),
                    "skipping completed stage"
                );

                payload = adopted.payload;
                resumed.push(stage.name().to_string());
                continue;
            }

            let outcome = stage
                .execute(self.store.as_ref(), id, payload, seed.clone())
                .await
                .map_err(stage_error)?;

            if outcome.executed {
                tracing::debug!(instance_id = id, stage = stage.name(), "stage done");
                executed.push(stage.name().to_string());
            } else {
                resumed.push(stage.name().to_string());
            }

            payload = outcome.result.payload;

            if outcome.bookmark {
                if idx + 1 < self.stages.len() {
                    status = RunStatus::Suspended;
                }
                tracing::info!(
                    instance_id = id,
                    stage = stage.name(),
                    "bookmark requested, stopping run"
                );
                break;
            }
        }

        tracing::info!(
            instance_id = id,
            workflow = self.name.as_str(),
            status = %status,
            executed = executed.len(),
            resumed = resumed.len(),
            "workflow run finished"
        );

        Ok(RunOutcome {
            instance_id: id.to_string(),
            status,
            payload,
            executed,
            resumed,
        })
    }

    /// Report every defined stage's persisted status without executing.
    pub async fn status(&self, id: &str) -> Result<Vec<StageReport>, RunError> {
        let synced = self
            .store
            .get_all(id)
            .await
            .map_err(|source| RunError::Fetch {
                instance_id: id.to_string(),
                source,
            })?;

        Ok(self
            .stages
            .iter()
            .map(|stage| match synced.get(stage.name()) {
                Some(result) => StageReport {
                    name: stage.name().to_string(),
                    status: result.status,
                    payload: Some(result.payload.clone()),
                },
                None => StageReport {
                    name: stage.name().to_string(),
                    status: StageStatus::Pending,
                    payload: None,
                },
            })
            .collect())
    }
}
