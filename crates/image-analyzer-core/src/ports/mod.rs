//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the domain core and external adapters.

mod inference;
mod progress;
mod result_store;

pub use inference::{
    filter_vision_models, is_supported_image, InferenceClient, SUPPORTED_EXTENSIONS,
    VISION_MODEL_KEYWORDS,
};
pub use progress::{BatchEvent, EventSink};
pub use result_store::{persist_result, ResultStore};
