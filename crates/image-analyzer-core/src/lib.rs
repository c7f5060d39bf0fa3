//! Image Analyzer Core - Domain logic and batch engine
//!
//! This crate contains the result and batch domain types, the response
//! validator, the metrics aggregator, and the ports through which adapters
//! plug in inference, persistence and progress reporting.

pub mod batch;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod validation;

pub use batch::{run_batch, spawn_batch, BatchHandle, BatchReport, BatchSession};
pub use domain::{
    AnalysisResult, ArtifactKind, ArtifactSelection, BatchJob, BatchProgress, BatchSummary,
    CancellationToken, FailedItem, PerformanceMetrics, PersistError, PersistenceOutcome,
    ValidatedResult,
};
pub use metrics::MetricsAggregator;
pub use ports::{BatchEvent, EventSink, InferenceClient, ResultStore};
pub use validation::{validate_response, ValidationError, ValidationLimits};
