//! Builders for results and fixture images.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use image_analyzer_core::domain::{AnalysisResult, PerformanceMetrics};

use crate::mocks::VALID_RESPONSE;

/// Builder for `AnalysisResult` values.
///
/// Defaults to a successful `llava` result with [`VALID_RESPONSE`] and no
/// source image.
#[derive(Debug, Clone)]
pub struct AnalysisResultBuilder {
    model: String,
    source: Option<PathBuf>,
    response: String,
    error: Option<String>,
    metrics: PerformanceMetrics,
}

impl Default for AnalysisResultBuilder {
    fn default() -> Self {
        Self {
            model: "llava".to_string(),
            source: None,
            response: VALID_RESPONSE.to_string(),
            error: None,
            metrics: PerformanceMetrics::default(),
        }
    }
}

impl AnalysisResultBuilder {
    /// Starts a successful result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model name.
    #[must_use]
    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Sets the source image.
    #[must_use]
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Sets the response text.
    #[must_use]
    pub fn response(mut self, text: &str) -> Self {
        self.response = text.to_string();
        self
    }

    /// Turns the result into a failure.
    #[must_use]
    pub fn failed(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Sets response tokens and generation time.
    #[must_use]
    pub const fn tokens(mut self, count: u64, duration_ns: u64) -> Self {
        self.metrics.response_tokens = Some(count);
        self.metrics.response_duration_ns = Some(duration_ns);
        self
    }

    /// Sets total request time.
    #[must_use]
    pub const fn total_duration(mut self, duration_ns: u64) -> Self {
        self.metrics.total_duration_ns = Some(duration_ns);
        self
    }

    /// Builds the result.
    #[must_use]
    pub fn build(self) -> AnalysisResult {
        match self.error {
            Some(error) => AnalysisResult::failed(self.model, self.source, error),
            None => AnalysisResult::succeeded(self.model, self.source, self.response)
                .with_metrics(self.metrics),
        }
    }
}

/// Writes a small gradient image, format chosen by `path`'s extension.
///
/// # Errors
///
/// Returns an error if the format is unknown or the file cannot be written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_test_image(path: &Path, width: u32, height: u32) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("Unknown image format: {}", path.display()))?;
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 255) / width.max(1)) as u8,
            ((y * 255) / height.max(1)) as u8,
            128,
        ])
    });
    img.save_with_format(path, format)
        .with_context(|| format!("Failed to write test image: {}", path.display()))
}

/// Writes a 16x16 JPEG at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_test_jpeg(path: &Path) -> Result<()> {
    write_test_image(path, 16, 16)
}
