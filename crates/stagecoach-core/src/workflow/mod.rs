//! Workflow engine core: stage definitions, the result writer handed to
//! handlers, the workflow builder, and the resumable run loop.
//!
//! - `writer` -- `ResultWriter` for recording output and requesting a bookmark
//! - `stage` -- `StageDefinition` and the lock -> invoke -> persist -> unlock cycle
//! - `definition` -- `WorkflowBuilder` / immutable `WorkflowDefinition`
//! - `executor` -- `run` and `status` over a definition and its `SyncStore`
//! - `error` -- handler, stage, run and definition errors

pub mod definition;
pub mod error;
pub mod executor;
pub mod stage;
pub mod writer;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use definition::{WorkflowBuilder, WorkflowDefinition};
pub use error::{DefinitionError, ErrorKind, HandlerError, RunError, StageError};
pub use executor::{RunOutcome, StageReport};
pub use stage::StageDefinition;
pub use writer::ResultWriter;

/// Bound shared by every workflow payload type.
///
/// Payloads cross the storage boundary as JSON and are handed to handlers
/// running on any task, hence serde and `Send + Sync + 'static`.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
