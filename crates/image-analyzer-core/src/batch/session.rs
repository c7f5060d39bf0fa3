//! Controller-side bookkeeping for a running batch.
//!
//! The session consumes [`BatchEvent`]s from the worker, persists successful
//! results, tracks throughput and ETA, and collects failed items for a
//! "retry failed only" follow-up batch.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::domain::{
    ArtifactKind, ArtifactSelection, BatchJob, BatchProgress, FailedItem, PersistenceOutcome,
};
use crate::metrics::MetricsAggregator;
use crate::ports::{persist_result, BatchEvent, ResultStore};

/// Failures listed individually in a report.
pub const MAX_LISTED_FAILURES: usize = 5;

/// Error messages in a report are cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 60;

/// State of the batch currently being observed.
pub struct BatchSession {
    store: Arc<dyn ResultStore>,
    selection: ArtifactSelection,
    job: Option<BatchJob>,
    progress: BatchProgress,
    metrics: MetricsAggregator,
    failed: Vec<FailedItem>,
    processed: usize,
    successful: usize,
    finished: bool,
    fault: Option<String>,
}

impl BatchSession {
    /// Creates a session writing artifacts through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ResultStore>, selection: ArtifactSelection) -> Self {
        Self {
            store,
            selection,
            job: None,
            progress: BatchProgress::start(0, Instant::now()),
            metrics: MetricsAggregator::new(),
            failed: Vec::new(),
            processed: 0,
            successful: 0,
            finished: false,
            fault: None,
        }
    }

    /// Resets all state for a new batch starting at `now`.
    ///
    /// Counters, start time, metrics and the failed-items list are cleared;
    /// a retry batch is a fresh batch, not a continuation.
    pub fn begin(&mut self, job: &BatchJob, now: Instant) {
        info!("Tracking batch of {} images", job.len());
        self.job = Some(job.clone());
        self.progress = BatchProgress::start(job.len(), now);
        self.metrics.reset();
        self.failed.clear();
        self.processed = 0;
        self.successful = 0;
        self.finished = false;
        self.fault = None;
    }

    /// Applies one worker event.
    ///
    /// Returns the persistence outcome when the event was a successful
    /// [`BatchEvent::ItemFinished`] and artifacts were requested.
    pub fn handle(&mut self, event: &BatchEvent) -> Option<PersistenceOutcome> {
        match event {
            BatchEvent::ItemStarted { index, total, path } => {
                debug!("Item {}/{total} started: {}", index + 1, path.display());
                None
            }
            BatchEvent::ItemRetrying { path, error } => {
                debug!("Retrying {}: {error}", path.display());
                None
            }
            BatchEvent::ItemFinished { index, result } => {
                self.processed += 1;
                self.progress.record_completion();
                let path = result
                    .source_image()
                    .map(PathBuf::from)
                    .or_else(|| self.job_path(*index))
                    .unwrap_or_default();

                if !result.is_success() {
                    let message = result.error().unwrap_or("Unknown error");
                    error!("Batch item failed: {} - {message}", path.display());
                    self.failed.push(FailedItem::new(path, message));
                    return None;
                }

                self.metrics.record(result);

                if self.selection.is_empty() {
                    self.successful += 1;
                    return None;
                }

                let outcome = persist_result(self.store.as_ref(), result, &self.selection);
                if outcome.is_success() {
                    self.successful += 1;
                    let saved: Vec<&str> = outcome.saved().map(|(kind, _)| kind.label()).collect();
                    info!(
                        "Batch item complete: {} -> Saved: {}",
                        path.display(),
                        saved.join(", ")
                    );
                } else {
                    let message = format!("Save error: {}", outcome.error_summary());
                    warn!("{}: {message}", path.display());
                    self.failed.push(FailedItem::new(path, message));
                }
                Some(outcome)
            }
            BatchEvent::BatchFinished {
                processed,
                successful,
            } => {
                self.finished = true;
                info!("Batch finished: {successful} of {processed} analyzed");
                if self.metrics.count() > 0 {
                    debug!(
                        "Metrics over {} items: {} response tokens, {} prompt tokens, \
                         avg total {:.2}s, avg load {:.2}s",
                        self.metrics.count(),
                        self.metrics.total_response_tokens(),
                        self.metrics.total_prompt_tokens(),
                        self.metrics.average_total_seconds().unwrap_or_default(),
                        self.metrics.average_load_seconds().unwrap_or_default(),
                    );
                }
                None
            }
            BatchEvent::BatchError { message } => {
                error!("Batch analysis error: {message}");
                self.fault = Some(message.clone());
                None
            }
        }
    }

    fn job_path(&self, index: usize) -> Option<PathBuf> {
        self.job.as_ref().and_then(|j| j.images.get(index)).cloned()
    }

    /// Estimated time remaining as of `now`; `None` before the first item.
    #[must_use]
    pub fn eta(&self, now: Instant) -> Option<Duration> {
        self.progress.eta(now)
    }

    /// Completion progress of the current batch.
    #[must_use]
    pub const fn progress(&self) -> &BatchProgress {
        &self.progress
    }

    /// Running performance averages.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    /// Items that failed analysis or could not be saved.
    #[must_use]
    pub fn failed_items(&self) -> &[FailedItem] {
        &self.failed
    }

    /// Whether `BatchFinished` has been seen.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// A new job over exactly the failed items, same prompt and model.
    ///
    /// `None` if nothing failed.
    #[must_use]
    pub fn retry_job(&self) -> Option<BatchJob> {
        let job = self.job.as_ref()?;
        if self.failed.is_empty() {
            return None;
        }
        let images = self.failed.iter().map(|f| f.path.clone()).collect();
        Some(BatchJob::new(images, job.prompt.clone(), job.model.clone()))
    }

    /// Summary of the batch so far.
    #[must_use]
    pub fn report(&self) -> BatchReport {
        BatchReport {
            total: self.progress.total(),
            processed: self.processed,
            successful: self.successful,
            failed: self.failed.clone(),
            fault: self.fault.clone(),
            saved_kinds: self.selection.kinds(),
            average_tokens_per_second: self.metrics.average_tokens_per_second(),
        }
    }
}

/// End-of-batch summary shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Images in the batch.
    pub total: usize,
    /// Images processed.
    pub processed: usize,
    /// Images analyzed and saved.
    pub successful: usize,
    /// Images that failed analysis or saving.
    pub failed: Vec<FailedItem>,
    /// Batch-level fault, if one ended the run.
    pub fault: Option<String>,
    /// Artifact kinds written per image.
    pub saved_kinds: Vec<ArtifactKind>,
    /// Average generation speed over the batch.
    pub average_tokens_per_second: Option<f64>,
}

impl BatchReport {
    /// Whether the batch ended before every image was processed.
    #[must_use]
    pub const fn stopped_early(&self) -> bool {
        self.processed < self.total
    }

    /// Whether every image was processed and saved.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && !self.stopped_early() && self.fault.is_none()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stopped_early() {
            writeln!(f, "Batch analysis stopped!")?;
            writeln!(f, "Processed: {} of {} images", self.processed, self.total)?;
        } else {
            writeln!(f, "Batch analysis complete!")?;
            writeln!(f, "Total images: {}", self.processed)?;
        }
        writeln!(f, "✓ Successful: {}", self.successful)?;

        if !self.failed.is_empty() {
            writeln!(f, "✗ Failed: {}", self.failed.len())?;
            writeln!(f, "Failed items:")?;
            for item in self.failed.iter().take(MAX_LISTED_FAILURES) {
                writeln!(f, "  • {}: {}", item.filename, truncate(&item.error_message))?;
            }
            if self.failed.len() > MAX_LISTED_FAILURES {
                writeln!(f, "  ... and {} more", self.failed.len() - MAX_LISTED_FAILURES)?;
            }
        }

        if let Some(fault) = &self.fault {
            writeln!(f, "Error: {fault}")?;
        }
        if self.stopped_early() {
            writeln!(f, "Stopped: {} not processed", self.total - self.processed)?;
        }
        if let Some(tps) = self.average_tokens_per_second {
            writeln!(f, "Average speed: {tps:.2} tok/s")?;
        }
        if !self.saved_kinds.is_empty() {
            let kinds: Vec<&str> = self.saved_kinds.iter().map(|k| k.label()).collect();
            writeln!(f, "Saved per image: {}", kinds.join(", "))?;
        }
        Ok(())
    }
}

fn truncate(message: &str) -> String {
    if message.chars().count() > MAX_ERROR_CHARS {
        let short: String = message.chars().take(MAX_ERROR_CHARS).collect();
        format!("{short}...")
    } else {
        message.to_string()
    }
}
