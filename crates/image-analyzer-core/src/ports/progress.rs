//! Batch event port for UI integration.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use tracing::debug;

use crate::domain::AnalysisResult;

/// Events emitted by the batch orchestrator, in order.
///
/// Every event for item `i` is emitted before item `i + 1` starts.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Analysis started for an image.
    ItemStarted {
        /// Position in the batch (0-based).
        index: usize,
        /// Images in the batch.
        total: usize,
        /// Path to the image.
        path: PathBuf,
    },
    /// The first attempt failed and the image is tried once more.
    ItemRetrying {
        /// Path to the image.
        path: PathBuf,
        /// Why the first attempt failed.
        error: String,
    },
    /// Final result for an image, successful or not.
    ItemFinished {
        /// Position in the batch (0-based).
        index: usize,
        /// The analysis result.
        result: AnalysisResult,
    },
    /// The batch ended, naturally, by cancellation, or after a fault.
    BatchFinished {
        /// Images processed.
        processed: usize,
        /// Images analyzed successfully.
        successful: usize,
    },
    /// A fault outside per-item handling ended the batch early.
    BatchError {
        /// Description of the fault.
        message: String,
    },
}

/// Port for receiving batch events.
pub trait EventSink: Send + Sync {
    /// Called for every event, in emission order.
    fn on_event(&self, event: BatchEvent);
}

impl EventSink for Sender<BatchEvent> {
    fn on_event(&self, event: BatchEvent) {
        if self.send(event).is_err() {
            debug!("Batch event receiver dropped, event discarded");
        }
    }
}
