//! The demonstration workflow: `first -> second -> third`, each stage
//! appending `-<stage name>` to its string input.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use stagecoach_core::sync::SyncStore;
use stagecoach_core::workflow::{DefinitionError, HandlerError, WorkflowDefinition};

pub const WORKFLOW_NAME: &str = "demo";

pub const STAGES: [&str; 3] = ["first", "second", "third"];

/// Per-invocation behaviour switches for the demo stages.
#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    /// Stage that records its output with a bookmark.
    pub bookmark_at: Option<String>,
    /// Stage whose handler fails.
    pub fail_at: Option<String>,
}

/// Build the demo definition over `store`, every stage using `lease`.
pub fn build<S: SyncStore>(
    store: Arc<S>,
    lease: Duration,
    options: &DemoOptions,
) -> Result<WorkflowDefinition<Value, S>, DefinitionError> {
    let mut builder = WorkflowDefinition::builder(WORKFLOW_NAME, store).with_default_lease(lease);

    for name in STAGES {
        let bookmark = options.bookmark_at.as_deref() == Some(name);
        let fail = options.fail_at.as_deref() == Some(name);

        builder = builder.then_default(name, move |rw, input: Value, _seed| async move {
            tracing::info!(stage = name, "executing {name} stage");

            if fail {
                return Err(HandlerError::failed(format!("stage '{name}' failed on request")));
            }
            let text = input
                .as_str()
                .ok_or_else(|| HandlerError::invalid_input(format!("expected a string, got {input}")))?;

            let next = Value::String(format!("{text}-{name}"));
            if bookmark {
                rw.bookmark(next);
            } else {
                rw.set(next);
            }
            Ok::<(), HandlerError>(())
        });
    }

    builder.build()
}
