//! Running performance averages over a batch.

use crate::domain::{AnalysisResult, PerformanceMetrics};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Sums of performance counters over items that reported token counts.
///
/// Items without a response token count are left out of both the sums and
/// the item count, so averages are never diluted by missing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsAggregator {
    count: u64,
    response_tokens: u64,
    prompt_tokens: u64,
    total_duration_ns: u64,
    response_duration_ns: u64,
    load_duration_ns: u64,
}

impl MetricsAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            response_tokens: 0,
            prompt_tokens: 0,
            total_duration_ns: 0,
            response_duration_ns: 0,
            load_duration_ns: 0,
        }
    }

    /// Adds a result's counters. Returns false if the result was skipped.
    pub fn record(&mut self, result: &AnalysisResult) -> bool {
        self.record_metrics(result.metrics())
    }

    /// Adds raw counters. Returns false if no response token count is present.
    pub fn record_metrics(&mut self, metrics: &PerformanceMetrics) -> bool {
        let Some(tokens) = metrics.response_tokens else {
            return false;
        };
        self.count += 1;
        self.response_tokens += tokens;
        self.prompt_tokens += metrics.prompt_tokens.unwrap_or(0);
        self.total_duration_ns += metrics.total_duration_ns.unwrap_or(0);
        self.response_duration_ns += metrics.response_duration_ns.unwrap_or(0);
        self.load_duration_ns += metrics.load_duration_ns.unwrap_or(0);
        true
    }

    /// Clears all sums.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of items included in the averages.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Sum of response tokens.
    #[must_use]
    pub const fn total_response_tokens(&self) -> u64 {
        self.response_tokens
    }

    /// Sum of prompt tokens.
    #[must_use]
    pub const fn total_prompt_tokens(&self) -> u64 {
        self.prompt_tokens
    }

    /// Σ response tokens / Σ response seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_tokens_per_second(&self) -> Option<f64> {
        (self.response_duration_ns > 0).then(|| {
            self.response_tokens as f64 / (self.response_duration_ns as f64 / NANOS_PER_SECOND)
        })
    }

    /// Mean total request time per item in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_total_seconds(&self) -> Option<f64> {
        (self.count > 0 && self.total_duration_ns > 0)
            .then(|| self.total_duration_ns as f64 / NANOS_PER_SECOND / self.count as f64)
    }

    /// Mean model load time per item in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_load_seconds(&self) -> Option<f64> {
        (self.count > 0 && self.load_duration_ns > 0)
            .then(|| self.load_duration_ns as f64 / NANOS_PER_SECOND / self.count as f64)
    }

    /// Mean response tokens per item.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_response_tokens(&self) -> Option<f64> {
        (self.count > 0).then(|| self.response_tokens as f64 / self.count as f64)
    }

    /// Mean prompt tokens per item, if any were reported.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_prompt_tokens(&self) -> Option<f64> {
        (self.count > 0 && self.prompt_tokens > 0)
            .then(|| self.prompt_tokens as f64 / self.count as f64)
    }
}
