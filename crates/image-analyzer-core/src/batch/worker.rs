//! Background thread running one batch.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::debug;

use super::orchestrator::{panic_message, run_batch};
use crate::domain::{BatchJob, BatchSummary, CancellationToken};
use crate::ports::{BatchEvent, InferenceClient};

/// Handle to a batch running on its own thread.
///
/// Events arrive in order on [`events`](Self::events); the channel closes
/// once the batch ends. The handle owns the cancellation token.
pub struct BatchHandle {
    token: CancellationToken,
    events: Receiver<BatchEvent>,
    thread: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    /// Requests cooperative cancellation.
    ///
    /// Takes effect before the next item starts; the current request runs
    /// to completion.
    pub fn cancel(&self) {
        debug!("Batch cancellation requested");
        self.token.cancel();
    }

    /// A clone of the token, e.g. for a signal handler.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Receiver for batch events.
    #[must_use]
    pub const fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Next event without blocking, `None` if none is pending or the batch
    /// has ended.
    #[must_use]
    pub fn try_next(&self) -> Option<BatchEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker thread and returns the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked outside the batch loop.
    pub fn join(self) -> Result<BatchSummary> {
        self.thread
            .join()
            .map_err(|payload| anyhow::anyhow!("Batch worker panicked: {}", panic_message(&*payload)))
    }
}

/// Starts `job` on a new thread.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_batch(job: BatchJob, client: Arc<dyn InferenceClient>) -> Result<BatchHandle> {
    let token = CancellationToken::new();
    let worker_token = token.clone();
    let (tx, events) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("batch-worker".to_string())
        .spawn(move || run_batch(&job, client.as_ref(), &worker_token, &tx))
        .context("Failed to spawn batch worker thread")?;

    Ok(BatchHandle {
        token,
        events,
        thread,
    })
}
