//! Mock implementations of core port traits.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image_analyzer_core::domain::{
    AnalysisResult, ArtifactKind, CancellationToken, PerformanceMetrics, PersistError,
    ValidatedResult,
};
use image_analyzer_core::ports::{BatchEvent, EventSink, InferenceClient, ResultStore};

/// Response text that passes validation.
pub const VALID_RESPONSE: &str =
    "A wooden rowing boat rests on a calm lake at sunrise, with pine trees along the shore.";

/// One scripted reply of [`MockInferenceClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Successful result with this response text.
    Success(String),
    /// Failed result with this error message.
    Failure(String),
    /// `Err` returned from `analyze`.
    Error(String),
    /// `analyze` panics with this message.
    Panic(String),
}

/// Mock implementation of `InferenceClient` for testing.
///
/// Replays scripted outcomes in call order, then succeeds with
/// [`VALID_RESPONSE`] and fixed metrics (100 tokens over 2 s).
pub struct MockInferenceClient {
    outcomes: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<Vec<PathBuf>>,
    connected: bool,
    models: Vec<String>,
}

impl MockInferenceClient {
    /// Creates a client that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// Creates a client replaying `outcomes` first.
    #[must_use]
    pub fn scripted(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
            connected: true,
            models: vec!["llava:latest".to_string(), "mistral:7b".to_string()],
        }
    }

    /// Creates a client whose endpoint is unreachable.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    /// Replaces the advertised model list.
    #[must_use]
    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(ToString::to_string).collect();
        self
    }

    /// Images passed to `analyze`, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `analyze` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Metrics attached to default successes.
    #[must_use]
    pub const fn default_metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            total_duration_ns: Some(3_000_000_000),
            load_duration_ns: Some(500_000_000),
            prompt_tokens: Some(600),
            prompt_duration_ns: Some(400_000_000),
            response_tokens: Some(100),
            response_duration_ns: Some(2_000_000_000),
        }
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceClient for MockInferenceClient {
    fn analyze(&self, image: &Path, _prompt: &str, model: &str) -> anyhow::Result<AnalysisResult> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image.to_path_buf());

        let next = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let source = Some(image.to_path_buf());

        match next {
            None => Ok(AnalysisResult::succeeded(model, source, VALID_RESPONSE)
                .with_metrics(Self::default_metrics())),
            Some(MockOutcome::Success(text)) => Ok(AnalysisResult::succeeded(model, source, text)),
            Some(MockOutcome::Failure(msg)) => Ok(AnalysisResult::failed(model, source, msg)),
            Some(MockOutcome::Error(msg)) => Err(anyhow::anyhow!(msg)),
            Some(MockOutcome::Panic(msg)) => panic!("{msg}"),
        }
    }

    fn test_connection(&self) -> bool {
        self.connected
    }

    fn list_models(&self) -> anyhow::Result<Vec<String>> {
        if self.connected {
            Ok(self.models.clone())
        } else {
            anyhow::bail!("connection refused")
        }
    }
}

/// Mock implementation of `EventSink` for testing.
///
/// Captures events and can cancel a token once a given number of items
/// have finished.
#[derive(Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<BatchEvent>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingSink {
    /// Creates a new recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels `token` when the `k`-th item finishes.
    #[must_use]
    pub fn cancel_after(k: usize, token: CancellationToken) -> Self {
        Self {
            events: Arc::default(),
            cancel_after: Some((k, token)),
        }
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of `ItemStarted` events.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.count(|e| matches!(e, BatchEvent::ItemStarted { .. }))
    }

    /// Returns the number of `ItemRetrying` events.
    #[must_use]
    pub fn retry_count(&self) -> usize {
        self.count(|e| matches!(e, BatchEvent::ItemRetrying { .. }))
    }

    /// Returns the number of `ItemFinished` events.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.count(|e| matches!(e, BatchEvent::ItemFinished { .. }))
    }

    /// Results carried by `ItemFinished` events.
    #[must_use]
    pub fn results(&self) -> Vec<AnalysisResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BatchEvent::ItemFinished { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Returns the counts from the `BatchFinished` event, if any.
    #[must_use]
    pub fn batch_finished(&self) -> Option<(usize, usize)> {
        self.events().iter().find_map(|e| match e {
            BatchEvent::BatchFinished {
                processed,
                successful,
            } => Some((*processed, *successful)),
            _ => None,
        })
    }

    /// Returns the message of the `BatchError` event, if any.
    #[must_use]
    pub fn batch_error(&self) -> Option<String> {
        self.events().iter().find_map(|e| match e {
            BatchEvent::BatchError { message } => Some(message.clone()),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&BatchEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: BatchEvent) {
        let finished = matches!(event, BatchEvent::ItemFinished { .. });
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);

        if let Some((k, token)) = &self.cancel_after {
            if finished && self.finished_count() >= *k {
                token.cancel();
            }
        }
    }
}

/// Mock implementation of `ResultStore` for testing.
///
/// Records every write in memory. Kinds marked as failing return an I/O
/// error instead.
#[derive(Default)]
pub struct MemoryResultStore {
    writes: Mutex<Vec<(ArtifactKind, String)>>,
    failing: Vec<ArtifactKind>,
}

impl MemoryResultStore {
    /// Creates a store where every write succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store where writes of `kinds` fail.
    #[must_use]
    pub fn failing(kinds: &[ArtifactKind]) -> Self {
        Self {
            writes: Mutex::default(),
            failing: kinds.to_vec(),
        }
    }

    /// Successful writes as (kind, response text).
    #[must_use]
    pub fn writes(&self) -> Vec<(ArtifactKind, String)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn store(
        &self,
        kind: ArtifactKind,
        result: &ValidatedResult<'_>,
        suffix: &str,
    ) -> Result<PathBuf, PersistError> {
        let result = result.result();
        let image = result.source_image().ok_or(PersistError::NoSourceImage)?;
        let path = PathBuf::from(format!("{}{suffix}", image.display()));
        if self.failing.contains(&kind) {
            return Err(PersistError::Io {
                path,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, result.response().to_string()));
        Ok(path)
    }
}

impl ResultStore for MemoryResultStore {
    fn save_text(
        &self,
        result: &ValidatedResult<'_>,
        _target: Option<&Path>,
        _overwrite: bool,
    ) -> Result<PathBuf, PersistError> {
        self.store(ArtifactKind::Text, result, ".txt")
    }

    fn save_sidecar(
        &self,
        result: &ValidatedResult<'_>,
        _target: Option<&Path>,
        _overwrite: bool,
    ) -> Result<PathBuf, PersistError> {
        self.store(ArtifactKind::Sidecar, result, ".yml")
    }

    fn write_metadata(&self, result: &ValidatedResult<'_>) -> Result<PathBuf, PersistError> {
        self.store(ArtifactKind::Metadata, result, "")
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_client_replays_script_then_succeeds() {
        let client = MockInferenceClient::scripted(vec![
            MockOutcome::Failure("busy".into()),
            MockOutcome::Error("reset".into()),
        ]);
        let path = Path::new("a.jpg");

        let first = client.analyze(path, "p", "llava").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(first.error(), Some("busy"));
        assert!(client.analyze(path, "p", "llava").is_err());
        let third = client.analyze(path, "p", "llava").unwrap_or_else(|e| panic!("{e}"));
        assert!(third.is_success());
        assert_eq!(third.tokens_per_second(), Some(50.0));
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn test_disconnected_client() {
        let client = MockInferenceClient::disconnected();
        assert!(!client.test_connection());
        assert!(client.list_models().is_err());
        assert!(client.vision_models().is_empty());
    }

    #[test]
    fn test_vision_models_from_advertised_list() {
        let client = MockInferenceClient::new().with_models(&["mistral:7b", "bakllava:latest"]);
        assert_eq!(client.vision_models(), vec!["bakllava:latest"]);

        // No vision keyword anywhere: everything is offered
        let client = MockInferenceClient::new().with_models(&["mistral:7b", "qwen2:1.5b"]);
        assert_eq!(client.vision_models(), vec!["mistral:7b", "qwen2:1.5b"]);
    }

    #[test]
    fn test_recording_sink_cancels_after_k() {
        let token = CancellationToken::new();
        let sink = RecordingSink::cancel_after(1, token.clone());
        sink.on_event(BatchEvent::ItemStarted {
            index: 0,
            total: 2,
            path: "a.jpg".into(),
        });
        assert!(!token.is_cancelled());

        sink.on_event(BatchEvent::ItemFinished {
            index: 0,
            result: AnalysisResult::succeeded("llava", None, VALID_RESPONSE),
        });
        assert!(token.is_cancelled());
        assert_eq!(sink.started_count(), 1);
        assert_eq!(sink.results().len(), 1);
    }
}
