//! Batch engine: the worker loop and the controller-side session.

mod orchestrator;
mod session;
mod worker;

pub use orchestrator::run_batch;
pub use session::{BatchReport, BatchSession, MAX_ERROR_CHARS, MAX_LISTED_FAILURES};
pub use worker::{spawn_batch, BatchHandle};
