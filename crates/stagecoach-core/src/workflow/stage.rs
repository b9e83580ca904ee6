//! A single pipeline step and its exclusive execution cycle.
//!
//! One cycle for (instance id, stage):
//!
//! 1. Take the stage lease. A held lease or a failing backend aborts with a
//!    conflict; nothing is retried here.
//! 2. Re-read the instance record under the lease. A stage that another
//!    execution completed in the meantime is adopted without running.
//! 3. Invoke the handler with a fresh `ResultWriter`, the current input and
//!    the seed. A handler error (or panic) persists nothing.
//! 4. Mark the recorded output `Done` and merge it into the instance record.
//!    If a `Done` result landed first (the lease expired while the handler
//!    ran), that result is kept and adopted instead.
//! 5. Release the lease on every exit path.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use stagecoach_types::stage::StageResult;

use crate::sync::SyncStore;

use super::error::{HandlerError, StageError};
use super::writer::ResultWriter;
use super::Payload;

/// Type-erased stage handler: `(writer, current input, seed)`.
pub type StageHandler<P> =
    Arc<dyn Fn(ResultWriter<P>, P, P) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Immutable description of one step: name, lease and handler.
pub struct StageDefinition<P> {
    name: String,
    lease: Duration,
    handler: StageHandler<P>,
}

impl<P> Clone for StageDefinition<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            lease: self.lease,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<P> std::fmt::Debug for StageDefinition<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDefinition")
            .field("name", &self.name)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

/// Result of a successful cycle.
#[derive(Debug)]
pub(crate) struct StageOutcome<P> {
    pub result: StageResult<P>,
    pub bookmark: bool,
    /// False when the stage was found `Done` after taking the lease.
    pub executed: bool,
}

impl<P: Payload> StageDefinition<P> {
    pub fn new<F, Fut>(name: impl Into<String>, lease: Duration, handler: F) -> Self
    where
        F: Fn(ResultWriter<P>, P, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            lease,
            handler: Arc::new(move |writer, input, seed| handler(writer, input, seed).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Run one exclusive cycle of this stage for instance `id`.
    pub(crate) async fn execute<S: SyncStore>(
        &self,
        store: &S,
        id: &str,
        input: P,
        seed: P,
    ) -> Result<StageOutcome<P>, StageError> {
        let acquired = store
            .lock(id, &self.name, self.lease)
            .await
            .map_err(StageError::LockFailed)?;

        if !acquired {
            tracing::warn!(
                instance_id = id,
                stage = self.name.as_str(),
                "stage lock held by another execution"
            );
            return Err(StageError::LockHeld);
        }

        tracing::debug!(
            instance_id = id,
            stage = self.name.as_str(),
            lease_ms = self.lease.as_millis() as u64,
            "acquired stage lock"
        );

        let outcome = self.execute_locked(store, id, input, seed).await;

        if let Err(e) = store.unlock(id, &self.name).await {
            tracing::warn!(
                instance_id = id,
                stage = self.name.as_str(),
                error = %e,
                "cannot release stage lock, lease will expire"
            );
        }

        outcome
    }

    async fn execute_locked<S: SyncStore>(
        &self,
        store: &S,
        id: &str,
        input: P,
        seed: P,
    ) -> Result<StageOutcome<P>, StageError> {
        let persisted = store
            .get(id, &self.name)
            .await
            .map_err(StageError::Storage)?;

        if let Some(persisted) = persisted.filter(StageResult::is_done) {
            tracing::debug!(
                instance_id = id,
                stage = self.name.as_str(),
                "stage completed by another execution, adopting result"
            );
            let result = persisted
                .decode::<P>()
                .map_err(|e| StageError::Codec(e.to_string()))?;
            return Ok(StageOutcome {
                result,
                bookmark: false,
                executed: false,
            });
        }

        let writer = ResultWriter::new();
        let invocation = {
            let writer = writer.clone();
            let input = input.clone();
            async move { (self.handler)(writer, input, seed).await }
        };

        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(StageError::Handler(e)),
            Err(panic) => {
                return Err(StageError::Handler(HandlerError::Panicked(panic_message(
                    panic.as_ref(),
                ))));
            }
        }

        // A handler that records nothing passes its input through.
        let recorded = writer.take();
        let result = StageResult::done(recorded.payload.unwrap_or(input));

        let encoded =
            StageResult::encode(&result).map_err(|e| StageError::Codec(e.to_string()))?;
        let kept = store
            .set(id, &self.name, &encoded)
            .await
            .map_err(StageError::Storage)?;

        // The lease ran out mid-handler and another execution stored first.
        if let Some(kept) = kept {
            tracing::warn!(
                instance_id = id,
                stage = self.name.as_str(),
                lease_ms = self.lease.as_millis() as u64,
                "stage finished elsewhere while handler ran, discarding own result"
            );
            let result = kept
                .decode::<P>()
                .map_err(|e| StageError::Codec(e.to_string()))?;
            return Ok(StageOutcome {
                result,
                bookmark: false,
                executed: false,
            });
        }

        Ok(StageOutcome {
            result,
            bookmark: recorded.bookmark,
            executed: true,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
