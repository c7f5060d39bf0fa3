//! Sequential batch loop with one automatic retry per item.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::domain::{display_name, AnalysisResult, BatchJob, BatchSummary, CancellationToken};
use crate::ports::{BatchEvent, EventSink, InferenceClient};

/// Runs a batch to completion, cancellation, or fault.
///
/// Items are processed strictly in order. The cancellation token is checked
/// once before each item; a request already in flight always completes. A
/// failed item is retried exactly once and never aborts the batch. Only a
/// panic escaping the per-item handling ends the loop early, reported once as
/// [`BatchEvent::BatchError`]. [`BatchEvent::BatchFinished`] is always the
/// last event.
pub fn run_batch(
    job: &BatchJob,
    client: &dyn InferenceClient,
    token: &CancellationToken,
    sink: &dyn EventSink,
) -> BatchSummary {
    let total = job.len();
    let mut processed = 0usize;
    let mut successful = 0usize;
    let mut cancelled = false;
    let mut fault = None;

    info!("Starting batch analysis of {total} images with {}", job.model);

    for (index, path) in job.images.iter().enumerate() {
        if token.is_cancelled() {
            info!("Batch analysis stopped by user after {processed} images");
            cancelled = true;
            break;
        }

        let item = panic::catch_unwind(AssertUnwindSafe(|| {
            process_item(job, client, sink, index, path)
        }));

        match item {
            Ok(succeeded) => {
                processed += 1;
                if succeeded {
                    successful += 1;
                }
            }
            Err(payload) => {
                let message = format!("Batch analysis error: {}", panic_message(&*payload));
                error!("{message}");
                sink.on_event(BatchEvent::BatchError {
                    message: message.clone(),
                });
                fault = Some(message);
                break;
            }
        }
    }

    if cancelled {
        info!("Batch analysis stopped: {successful}/{processed} successful (out of {total} total)");
    } else {
        info!("Batch analysis complete: {successful}/{total} successful");
    }

    sink.on_event(BatchEvent::BatchFinished {
        processed,
        successful,
    });

    BatchSummary {
        processed,
        successful,
        total,
        cancelled,
        fault,
    }
}

/// Analyzes one image, retrying once. Returns whether it succeeded.
fn process_item(
    job: &BatchJob,
    client: &dyn InferenceClient,
    sink: &dyn EventSink,
    index: usize,
    path: &Path,
) -> bool {
    let total = job.len();
    let name = display_name(path);

    sink.on_event(BatchEvent::ItemStarted {
        index,
        total,
        path: path.to_path_buf(),
    });
    debug!("Analyzing {}/{total}: {name}", index + 1);

    let result = match attempt(job, client, path) {
        Ok(result) => result,
        Err(first) => {
            warn!("Analysis failed for {name}: {first}. Retrying...");
            sink.on_event(BatchEvent::ItemRetrying {
                path: path.to_path_buf(),
                error: first.clone(),
            });

            match attempt(job, client, path) {
                Ok(result) => {
                    info!("Retry successful for {name}");
                    result
                }
                Err(second) => {
                    error!("Retry also failed for {name}: {second}");
                    AnalysisResult::failed(
                        job.model.clone(),
                        Some(path.to_path_buf()),
                        format!("Failed twice: {first}; {second}"),
                    )
                }
            }
        }
    };

    let succeeded = result.is_success();
    sink.on_event(BatchEvent::ItemFinished { index, result });
    succeeded
}

/// One inference call, with business failures and raised errors folded
/// into a single error string.
fn attempt(job: &BatchJob, client: &dyn InferenceClient, path: &Path) -> Result<AnalysisResult, String> {
    match client.analyze(path, &job.prompt, &job.model) {
        Ok(result) if result.is_success() => Ok(result),
        Ok(result) => Err(result.error().unwrap_or("Unknown error").to_string()),
        Err(e) => Err(format!("{e:#}")),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
