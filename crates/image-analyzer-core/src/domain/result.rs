//! Analysis result types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Performance counters reported by the inference endpoint.
///
/// Every counter is optional. A counter the endpoint did not report stays
/// `None` and is never treated as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Wall time of the whole request in nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_ns: Option<u64>,
    /// Time spent loading the model in nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_duration_ns: Option<u64>,
    /// Number of prompt tokens evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Time spent evaluating the prompt in nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_duration_ns: Option<u64>,
    /// Number of generated response tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_tokens: Option<u64>,
    /// Time spent generating the response in nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_duration_ns: Option<u64>,
}

impl PerformanceMetrics {
    /// Response generation speed, when both token count and duration are known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tokens_per_second(&self) -> Option<f64> {
        match (self.response_tokens, self.response_duration_ns) {
            (Some(tokens), Some(duration)) if tokens > 0 && duration > 0 => {
                Some(tokens as f64 / (duration as f64 / NANOS_PER_SECOND))
            }
            _ => None,
        }
    }

    /// Total request time in seconds, when reported.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_seconds(&self) -> Option<f64> {
        self.total_duration_ns
            .filter(|&ns| ns > 0)
            .map(|ns| ns as f64 / NANOS_PER_SECOND)
    }

    /// Returns true if no counter was reported at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_duration_ns.is_none()
            && self.load_duration_ns.is_none()
            && self.prompt_tokens.is_none()
            && self.prompt_duration_ns.is_none()
            && self.response_tokens.is_none()
            && self.response_duration_ns.is_none()
    }
}

/// Outcome of analyzing a single image.
///
/// Built once through [`AnalysisResult::succeeded`] or
/// [`AnalysisResult::failed`] and read through accessors afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    success: bool,
    response: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_image: Option<PathBuf>,
    #[serde(flatten)]
    metrics: PerformanceMetrics,
}

impl AnalysisResult {
    /// Creates a successful result carrying the model's response text.
    #[must_use]
    pub fn succeeded(
        model: impl Into<String>,
        source_image: Option<PathBuf>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            response: response.into(),
            model: model.into(),
            error: None,
            source_image,
            metrics: PerformanceMetrics::default(),
        }
    }

    /// Creates a failed result with an error description.
    #[must_use]
    pub fn failed(
        model: impl Into<String>,
        source_image: Option<PathBuf>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            response: String::new(),
            model: model.into(),
            error: Some(error.into()),
            source_image,
            metrics: PerformanceMetrics::default(),
        }
    }

    /// Attaches performance counters.
    #[must_use]
    pub const fn with_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Whether the inference call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// True if the call failed or an error was recorded.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        !self.success || self.error.is_some()
    }

    /// Response text (empty for failures).
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Name of the model that produced this result.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Error description, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Image this result belongs to.
    #[must_use]
    pub fn source_image(&self) -> Option<&Path> {
        self.source_image.as_deref()
    }

    /// Performance counters.
    #[must_use]
    pub const fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Shortcut for [`PerformanceMetrics::tokens_per_second`].
    #[must_use]
    pub fn tokens_per_second(&self) -> Option<f64> {
        self.metrics.tokens_per_second()
    }

    /// Shortcut for [`PerformanceMetrics::total_seconds`].
    #[must_use]
    pub fn total_seconds(&self) -> Option<f64> {
        self.metrics.total_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_per_second() {
        let metrics = PerformanceMetrics {
            response_tokens: Some(100),
            response_duration_ns: Some(2_000_000_000),
            ..PerformanceMetrics::default()
        };
        let tps = metrics.tokens_per_second();
        assert!(tps.is_some_and(|v| (v - 50.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_tokens_per_second_requires_both_counters() {
        let only_tokens = PerformanceMetrics {
            response_tokens: Some(100),
            ..PerformanceMetrics::default()
        };
        assert!(only_tokens.tokens_per_second().is_none());

        let only_duration = PerformanceMetrics {
            response_duration_ns: Some(1_000),
            ..PerformanceMetrics::default()
        };
        assert!(only_duration.tokens_per_second().is_none());
    }

    #[test]
    fn test_total_seconds() {
        let metrics = PerformanceMetrics {
            total_duration_ns: Some(1_500_000_000),
            ..PerformanceMetrics::default()
        };
        assert!(metrics
            .total_seconds()
            .is_some_and(|v| (v - 1.5).abs() < f64::EPSILON));
        assert!(PerformanceMetrics::default().total_seconds().is_none());
    }

    #[test]
    fn test_failed_result_is_error() {
        let result = AnalysisResult::failed("llava", None, "boom");
        assert!(!result.is_success());
        assert!(result.is_error());
        assert_eq!(result.error(), Some("boom"));
        assert!(result.response().is_empty());
    }

    #[test]
    fn test_succeeded_result_keeps_missing_metrics_unknown() {
        let result = AnalysisResult::succeeded("llava", Some("a.jpg".into()), "text");
        assert!(result.is_success());
        assert!(!result.is_error());
        assert!(result.metrics().is_empty());
        assert!(result.tokens_per_second().is_none());
        assert_eq!(result.source_image(), Some(Path::new("a.jpg")));
    }

    #[test]
    fn test_serialization_skips_unknown_counters() {
        let result = AnalysisResult::succeeded("llava", None, "text").with_metrics(
            PerformanceMetrics {
                response_tokens: Some(7),
                ..PerformanceMetrics::default()
            },
        );
        let json = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(json["response_tokens"], 7);
        assert!(json.get("total_duration_ns").is_none());
        assert!(json.get("error").is_none());
    }
}
