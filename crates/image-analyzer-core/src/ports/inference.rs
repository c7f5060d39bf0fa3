//! Inference port for vision models.

use std::path::Path;

use tracing::warn;

use crate::domain::AnalysisResult;

/// Image extensions accepted by vision models (lowercase, without dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"];

/// Substrings that mark a model name as vision-capable.
pub const VISION_MODEL_KEYWORDS: &[&str] = &["llava", "bakllava", "moondream", "vision", "clip"];

/// Port for the vision inference endpoint.
///
/// Implementations are stateless beyond their configuration and handle one
/// request at a time.
pub trait InferenceClient: Send + Sync {
    /// Analyzes one image with the given prompt and model.
    ///
    /// A missing file or unsupported extension yields a failed
    /// [`AnalysisResult`] without touching the network. Business failures are
    /// reported through the result as well.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults the implementation could not turn
    /// into a result. Callers treat both the same way.
    fn analyze(&self, image: &Path, prompt: &str, model: &str) -> anyhow::Result<AnalysisResult>;

    /// Probes the endpoint. Never fails, only reports reachability.
    fn test_connection(&self) -> bool;

    /// Lists all model names known to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached.
    fn list_models(&self) -> anyhow::Result<Vec<String>>;

    /// Lists vision-capable models, or all models if none look like one.
    ///
    /// Returns an empty list when listing fails.
    fn vision_models(&self) -> Vec<String> {
        match self.list_models() {
            Ok(models) => filter_vision_models(models),
            Err(e) => {
                warn!("Failed to get vision models: {e:#}");
                Vec::new()
            }
        }
    }
}

/// Checks if a path has a supported image extension (case-insensitive).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Keeps model names containing a vision keyword.
///
/// Falls back to the full list when nothing matches, since custom vision
/// models often carry arbitrary names.
#[must_use]
pub fn filter_vision_models(models: Vec<String>) -> Vec<String> {
    let vision: Vec<String> = models
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            VISION_MODEL_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .cloned()
        .collect();

    if vision.is_empty() {
        warn!("No obvious vision models found, returning all models");
        models
    } else {
        vision
    }
}
