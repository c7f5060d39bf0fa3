//! Test support utilities for image-analyzer.
//!
//! Provides mocks of the core ports, result builders, and fixture image
//! writers for testing the batch pipeline.
//!
//! # Example
//!
//! ```
//! use image_analyzer_core::{run_batch, BatchJob, CancellationToken};
//! use image_analyzer_test_support::{MockInferenceClient, RecordingSink};
//!
//! let job = BatchJob::new(vec!["a.jpg".into(), "b.jpg".into()], "Describe", "llava");
//! let sink = RecordingSink::new();
//! let summary = run_batch(&job, &MockInferenceClient::new(), &CancellationToken::new(), &sink);
//!
//! assert_eq!(summary.successful, 2);
//! assert_eq!(sink.batch_finished(), Some((2, 2)));
//! ```

mod builders;
mod mocks;

pub use builders::{write_test_image, write_test_jpeg, AnalysisResultBuilder};
pub use mocks::{
    MemoryResultStore, MockInferenceClient, MockOutcome, RecordingSink, VALID_RESPONSE,
};
