//! Output handle passed to a stage handler.

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
struct Recorded<P> {
    payload: Option<P>,
    bookmark: bool,
}

/// What a handler recorded through its writer.
#[derive(Debug)]
pub(crate) struct WriterOutput<P> {
    pub payload: Option<P>,
    pub bookmark: bool,
}

/// Records a stage's output during one handler invocation.
///
/// The handler receives its own clone; the engine keeps another and reads the
/// recorded output once the handler's future has completed. A fresh writer is
/// created for every invocation and dropped afterwards.
pub struct ResultWriter<P> {
    slot: Arc<Mutex<Recorded<P>>>,
}

impl<P> Clone for ResultWriter<P> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<P> ResultWriter<P> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Recorded {
                payload: None,
                bookmark: false,
            })),
        }
    }

    /// Record the stage's output. The last call wins.
    pub fn set(&self, payload: P) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .payload = Some(payload);
    }

    /// Record the stage's output and stop the run once it has been persisted.
    ///
    /// The next `run` for the same instance resumes at the following stage.
    pub fn bookmark(&self, payload: P) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.payload = Some(payload);
        slot.bookmark = true;
    }

    /// Whether `bookmark` has been called during this invocation.
    pub fn is_bookmarked(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bookmark
    }

    pub(crate) fn take(&self) -> WriterOutput<P> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        WriterOutput {
            payload: slot.payload.take(),
            bookmark: std::mem::take(&mut slot.bookmark),
        }
    }
}

impl<P> std::fmt::Debug for ResultWriter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultWriter")
            .field("bookmark", &self.is_bookmarked())
            .finish_non_exhaustive()
    }
}
