//! Workflow definition and its append-only builder.
//!
//! A definition is built once, validated, and then shared read-only (usually
//! behind an `Arc`) by every `run` call, for any number of instance ids.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::sync::SyncStore;

use super::error::{DefinitionError, HandlerError};
use super::stage::StageDefinition;
use super::writer::ResultWriter;
use super::Payload;

/// Lease used by `then_default` unless the builder is told otherwise.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// WorkflowBuilder
// ---------------------------------------------------------------------------

/// Collects stages in order. Call [`WorkflowBuilder::build`] to validate and
/// freeze the sequence.
pub struct WorkflowBuilder<P, S> {
    name: String,
    store: Arc<S>,
    stages: Vec<StageDefinition<P>>,
    default_lease: Duration,
}

impl<P: Payload, S: SyncStore> WorkflowBuilder<P, S> {
    /// Lease applied by later `then_default` calls.
    pub fn with_default_lease(mut self, lease: Duration) -> Self {
        self.default_lease = lease;
        self
    }

    /// Append a stage.
    pub fn then<F, Fut>(mut self, name: impl Into<String>, lease: Duration, handler: F) -> Self
    where
        F: Fn(ResultWriter<P>, P, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.stages.push(StageDefinition::new(name, lease, handler));
        self
    }

    /// Alias for [`WorkflowBuilder::then`].
    pub fn add<F, Fut>(self, name: impl Into<String>, lease: Duration, handler: F) -> Self
    where
        F: Fn(ResultWriter<P>, P, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.then(name, lease, handler)
    }

    /// Append a stage using the builder's default lease.
    pub fn then_default<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ResultWriter<P>, P, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let lease = self.default_lease;
        self.then(name, lease, handler)
    }

    /// Append an already constructed stage.
    pub fn stage(mut self, stage: StageDefinition<P>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validate stage names and freeze the definition.
    ///
    /// Names must be non-empty and unique: results are keyed by stage name
    /// within an instance record.
    pub fn build(self) -> Result<WorkflowDefinition<P, S>, DefinitionError> {
        let mut seen = HashSet::with_capacity(self.stages.len());
        for stage in &self.stages {
            if stage.name().trim().is_empty() {
                return Err(DefinitionError::EmptyStageName);
            }
            if !seen.insert(stage.name()) {
                return Err(DefinitionError::DuplicateStage(stage.name().to_string()));
            }
            if stage.lease().is_zero() {
                return Err(DefinitionError::ZeroLease(stage.name().to_string()));
            }
        }

        tracing::debug!(
            workflow = self.name.as_str(),
            stages = self.stages.len(),
            "built workflow definition"
        );

        Ok(WorkflowDefinition {
            name: self.name,
            store: self.store,
            stages: self.stages,
        })
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// Ordered, immutable stage sequence bound to a `SyncStore`.
pub struct WorkflowDefinition<P, S> {
    pub(crate) name: String,
    pub(crate) store: Arc<S>,
    pub(crate) stages: Vec<StageDefinition<P>>,
}

impl<P: Payload, S: SyncStore> WorkflowDefinition<P, S> {
    /// Start building a definition named `name` over `store`.
    pub fn builder(name: impl Into<String>, store: Arc<S>) -> WorkflowBuilder<P, S> {
        WorkflowBuilder {
            name: name.into(),
            store,
            stages: Vec::new(),
            default_lease: DEFAULT_LEASE,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stages(&self) -> &[StageDefinition<P>] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(StageDefinition::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
