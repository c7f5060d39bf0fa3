//! Batch job description and bookkeeping types.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An ordered set of images analyzed with one prompt and one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// Images in processing order.
    pub images: Vec<PathBuf>,
    /// Prompt sent with every image.
    pub prompt: String,
    /// Model used for every image.
    pub model: String,
}

impl BatchJob {
    /// Creates a new batch job.
    #[must_use]
    pub fn new(images: Vec<PathBuf>, prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            images,
            prompt: prompt.into(),
            model: model.into(),
        }
    }

    /// Number of images in the job.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true if the job has no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// One-shot cooperative cancellation flag.
///
/// The controller calls [`cancel`](Self::cancel); the batch worker samples
/// [`is_cancelled`](Self::is_cancelled) once before each item. The flag only
/// ever moves from `false` to `true`, and an in-flight request is never
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Completion counter with ETA extrapolation.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    completed: usize,
    total: usize,
    started_at: Instant,
}

impl BatchProgress {
    /// Starts tracking a batch of `total` items at `started_at`.
    #[must_use]
    pub const fn start(total: usize, started_at: Instant) -> Self {
        Self {
            completed: 0,
            total,
            started_at,
        }
    }

    /// Marks one more item as completed. Never exceeds the total.
    pub fn record_completion(&mut self) {
        if self.completed < self.total {
            self.completed += 1;
        }
    }

    /// Items completed so far.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Items in the batch.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// When the batch started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Estimated time remaining as of `now`.
    ///
    /// Average elapsed time per completed item times the number of items
    /// left. `None` until the first item completes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn eta(&self, now: Instant) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        let per_item = elapsed.as_secs_f64() / self.completed as f64;
        let remaining = self.total - self.completed;
        Some(Duration::from_secs_f64(per_item * remaining as f64))
    }
}

/// An item that failed during a batch, kept for a "retry failed only" run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Full path to the image.
    pub path: PathBuf,
    /// File name for display.
    pub filename: String,
    /// What went wrong.
    pub error_message: String,
}

impl FailedItem {
    /// Creates a failed item, deriving the display name from the path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, error_message: impl Into<String>) -> Self {
        let path = path.into();
        let filename = display_name(&path);
        Self {
            path,
            filename,
            error_message: error_message.into(),
        }
    }
}

/// Final counters of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items that went through analysis (successfully or not).
    pub processed: usize,
    /// Items whose analysis succeeded.
    pub successful: usize,
    /// Items in the job.
    pub total: usize,
    /// Whether the run stopped because of a cancellation request.
    pub cancelled: bool,
    /// Batch-level fault that ended the run early, if any.
    pub fault: Option<String>,
}

impl BatchSummary {
    /// Items that were processed but failed.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.processed - self.successful
    }

    /// Items never started.
    #[must_use]
    pub const fn not_processed(&self) -> usize {
        self.total - self.processed
    }
}

/// File name of a path, falling back to the full path.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}
