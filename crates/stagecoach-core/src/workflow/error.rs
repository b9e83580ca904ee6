//! Error types for stage handlers, stage cycles, runs and definitions.

use stagecoach_types::error::StorageError;

// ---------------------------------------------------------------------------
// HandlerError
// ---------------------------------------------------------------------------

/// Failure reported by a stage's own logic.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The stage received input of a shape it does not accept.
    #[error("invalid stage input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),

    /// The handler panicked; the panic message is kept.
    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn invalid_input(msg: impl std::fmt::Display) -> Self {
        HandlerError::InvalidInput(msg.to_string())
    }

    pub fn failed(msg: impl std::fmt::Display) -> Self {
        HandlerError::Failed(msg.to_string())
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse classification of a failed stage or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stage lock could not be acquired.
    Conflict,
    /// The stage's handler returned an error.
    Handler,
    /// The sync backend failed, or stored data could not be decoded.
    Storage,
}

// ---------------------------------------------------------------------------
// StageError
// ---------------------------------------------------------------------------

/// Failure of one lock -> invoke -> persist -> unlock cycle.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Another execution currently holds the stage lease.
    #[error("cannot get exclusive lock: stage is being executed elsewhere")]
    LockHeld,

    /// The backend failed while trying to take the lease.
    #[error("cannot get exclusive lock: {0}")]
    LockFailed(#[source] StorageError),

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("cannot sync stage result: {0}")]
    Storage(#[source] StorageError),

    #[error("stage payload codec error: {0}")]
    Codec(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::LockHeld | StageError::LockFailed(_) => ErrorKind::Conflict,
            StageError::Handler(_) => ErrorKind::Handler,
            StageError::Storage(_) | StageError::Codec(_) => ErrorKind::Storage,
        }
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Failure of a `run` call, naming the instance and, when known, the stage.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("cannot fetch synced state for instance '{instance_id}': {source}")]
    Fetch {
        instance_id: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to execute stage '{stage}' for instance '{instance_id}': {source}")]
    Stage {
        instance_id: String,
        stage: String,
        #[source]
        source: StageError,
    },
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Fetch { .. } => ErrorKind::Storage,
            RunError::Stage { source, .. } => source.kind(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn instance_id(&self) -> &str {
        match self {
            RunError::Fetch { instance_id, .. } | RunError::Stage { instance_id, .. } => {
                instance_id.as_str()
            }
        }
    }

    /// Name of the failing stage, if the failure happened inside one.
    pub fn stage(&self) -> Option<&str> {
        match self {
            RunError::Fetch { .. } => None,
            RunError::Stage { stage, .. } => Some(stage.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// DefinitionError
// ---------------------------------------------------------------------------

/// Rejected workflow definition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("stage name must not be empty")]
    EmptyStageName,

    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),

    /// A stage whose lease expires the moment it is taken.
    #[error("stage '{0}' has a zero lease")]
    ZeroLease(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_display_names_stage_and_instance() {
        let err = RunError::Stage {
            instance_id: "order-7".to_string(),
            stage: "charge".to_string(),
            source: StageError::Handler(HandlerError::failed("card declined")),
        };
        let msg = err.to_string();
        assert!(msg.contains("order-7"));
        assert!(msg.contains("charge"));
        assert!(msg.contains("card declined"));
        assert_eq!(err.kind(), ErrorKind::Handler);
        assert_eq!(err.stage(), Some("charge"));
        assert_eq!(err.instance_id(), "order-7");
    }

    #[test]
    fn stage_error_kinds() {
        assert_eq!(StageError::LockHeld.kind(), ErrorKind::Conflict);
        assert_eq!(
            StageError::LockFailed(StorageError::Connection("down".into())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            StageError::Storage(StorageError::Query("disk full".into())).kind(),
            ErrorKind::Storage
        );
        assert_eq!(StageError::Codec("bad".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn fetch_error_has_no_stage() {
        let err = RunError::Fetch {
            instance_id: "id-1".to_string(),
            source: StorageError::Connection("refused".into()),
        };
        assert!(err.stage().is_none());
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!err.is_conflict());
    }

    #[test]
    fn invalid_input_is_a_handler_error() {
        let err = StageError::from(HandlerError::invalid_input("expected a string"));
        assert_eq!(err.kind(), ErrorKind::Handler);
        assert!(err.to_string().contains("expected a string"));
    }
}
