//! Core domain types for batch image analysis.

mod batch;
mod persistence;
mod result;

pub use batch::{BatchJob, BatchProgress, BatchSummary, CancellationToken, FailedItem};
pub(crate) use batch::display_name;
pub use persistence::{
    ArtifactKind, ArtifactSelection, PersistError, PersistenceOutcome, ValidatedResult,
    MAX_NUMBERED_SUFFIX,
};
pub use result::{AnalysisResult, PerformanceMetrics};
