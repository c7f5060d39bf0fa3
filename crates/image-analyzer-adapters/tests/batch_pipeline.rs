//! Batch pipeline tests: worker, session and filesystem store together.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::float_cmp
)]

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image_analyzer_adapters::FsResultStore;
use image_analyzer_core::{
    run_batch, spawn_batch, AnalysisResult, ArtifactKind, ArtifactSelection, BatchEvent, BatchJob,
    BatchSession, CancellationToken, InferenceClient,
};
use image_analyzer_test_support::{
    write_test_jpeg, MemoryResultStore, MockInferenceClient, MockOutcome, RecordingSink,
};

fn images(dir: &Path, n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| {
            let path = dir.join(format!("img{i}.jpg"));
            write_test_jpeg(&path).unwrap();
            path
        })
        .collect()
}

fn failure(msg: &str) -> MockOutcome {
    MockOutcome::Failure(msg.to_string())
}

/// Runs `job` on the calling thread and feeds every event to `session`.
fn run_with_session(job: &BatchJob, client: &MockInferenceClient, session: &mut BatchSession) {
    let (tx, rx) = mpsc::channel();
    session.begin(job, Instant::now());
    run_batch(job, client, &CancellationToken::new(), &tx);
    drop(tx);
    for event in rx {
        session.handle(&event);
    }
}

#[test]
fn test_spawned_batch_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let job = BatchJob::new(images(dir.path(), 3), "Describe", "llava");
    let mut session = BatchSession::new(Arc::new(FsResultStore::new()), ArtifactSelection::default());
    session.begin(&job, Instant::now());

    let handle = spawn_batch(job, Arc::new(MockInferenceClient::new())).unwrap();
    let mut last = None;
    for event in handle.events() {
        session.handle(&event);
        last = Some(event);
    }
    let summary = handle.join().unwrap();

    assert_eq!(
        last,
        Some(BatchEvent::BatchFinished {
            processed: 3,
            successful: 3
        })
    );
    assert_eq!(summary.processed, 3);
    assert!(session.is_finished());
    for i in 0..3 {
        assert!(dir.path().join(format!("img{i}.txt")).exists());
    }

    let report = session.report();
    assert!(report.all_succeeded());
    assert_eq!(report.successful, 3);
    assert_eq!(session.metrics().count(), 3);
    assert_eq!(report.average_tokens_per_second, Some(50.0));
    assert!(session.retry_job().is_none());
}

#[test]
fn test_cancel_after_k_items() {
    for k in 1..=3 {
        let token = CancellationToken::new();
        let sink = RecordingSink::cancel_after(k, token.clone());
        let paths = (0..5).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect();
        let job = BatchJob::new(paths, "Describe", "llava");
        let client = MockInferenceClient::new();

        let summary = run_batch(&job, &client, &token, &sink);

        assert_eq!(summary.processed, k);
        assert!(summary.cancelled);
        assert_eq!(summary.not_processed(), 5 - k);
        assert_eq!(client.call_count(), k);
        assert_eq!(sink.batch_finished(), Some((k, k)));
    }
}

/// Client that waits for a permit before every request.
struct GatedClient {
    permits: Mutex<Receiver<()>>,
    inner: MockInferenceClient,
}

impl InferenceClient for GatedClient {
    fn analyze(&self, image: &Path, prompt: &str, model: &str) -> anyhow::Result<AnalysisResult> {
        // A closed gate lets every request through
        let _ = self.permits.lock().unwrap().recv();
        self.inner.analyze(image, prompt, model)
    }

    fn test_connection(&self) -> bool {
        true
    }

    fn list_models(&self) -> anyhow::Result<Vec<String>> {
        self.inner.list_models()
    }
}

#[test]
fn test_handle_cancel_stops_spawned_batch() {
    let (permit, permits) = mpsc::channel();
    let client = Arc::new(GatedClient {
        permits: Mutex::new(permits),
        inner: MockInferenceClient::new(),
    });
    let paths: Vec<PathBuf> = (0..3).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect();
    let job = BatchJob::new(paths.clone(), "Describe", "llava");

    let handle = spawn_batch(job, Arc::clone(&client) as Arc<dyn InferenceClient>).unwrap();
    let first = handle.events().recv().unwrap();
    assert!(matches!(first, BatchEvent::ItemStarted { index: 0, total: 3, .. }));

    // The first request is in flight; cancel before releasing it
    handle.cancel();
    permit.send(()).unwrap();
    drop(permit);

    while !handle.is_finished() {
        thread::sleep(Duration::from_millis(5));
    }
    let mut rest = Vec::new();
    while let Some(event) = handle.try_next() {
        rest.push(event);
    }
    let summary = handle.join().unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.not_processed(), 2);
    assert_eq!(client.inner.calls(), vec![paths[0].clone()]);
    assert!(matches!(rest.first(), Some(BatchEvent::ItemFinished { index: 0, .. })));
    assert_eq!(
        rest.last(),
        Some(&BatchEvent::BatchFinished {
            processed: 1,
            successful: 1
        })
    );
}

#[test]
fn test_counts_stay_within_bounds() {
    let client = MockInferenceClient::scripted(vec![
        failure("a"),
        failure("b"),
        failure("c"),
        MockOutcome::Success("Recovered on the second attempt with a proper description.".into()),
    ]);
    let paths = (0..4).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect();
    let job = BatchJob::new(paths, "Describe", "llava");
    let sink = RecordingSink::new();

    let summary = run_batch(&job, &client, &CancellationToken::new(), &sink);

    assert!(summary.processed <= job.len());
    assert!(summary.successful <= summary.processed);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.successful, 3);
    assert_eq!(sink.retry_count(), 2);
    // Each retry follows its own item immediately
    let names: Vec<PathBuf> = ["img0", "img0", "img1", "img1", "img2", "img3"]
        .iter()
        .map(|n| PathBuf::from(format!("{n}.jpg")))
        .collect();
    assert_eq!(client.calls(), names);
}

#[test]
fn test_panicking_client_ends_batch_with_error() {
    let client = MockInferenceClient::scripted(vec![
        MockOutcome::Success("A perfectly normal first description of the image.".into()),
        MockOutcome::Panic("decoder exploded".into()),
    ]);
    let paths = (0..3).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect();
    let job = BatchJob::new(paths, "Describe", "llava");
    let sink = RecordingSink::new();

    let summary = run_batch(&job, &client, &CancellationToken::new(), &sink);

    let message = sink.batch_error().expect("fault should be reported");
    assert!(message.contains("decoder exploded"), "{message}");
    assert_eq!(sink.batch_finished(), Some((1, 1)));
    assert!(matches!(
        sink.events().last(),
        Some(BatchEvent::BatchFinished { .. })
    ));
    assert_eq!(summary.fault.as_deref(), Some(message.as_str()));
    assert_eq!(summary.processed, 1);
}

#[test]
fn test_session_collects_failures_and_builds_retry_job() {
    let client = MockInferenceClient::scripted(vec![
        failure("first"),
        failure("second"),
        MockOutcome::Success("too short".into()),
    ]);
    let paths: Vec<PathBuf> = (0..3).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect();
    let job = BatchJob::new(paths.clone(), "Describe", "llava:13b");
    let store = Arc::new(MemoryResultStore::new());
    let mut session = BatchSession::new(store.clone(), ArtifactSelection::default());

    run_with_session(&job, &client, &mut session);

    let failed = session.failed_items();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].path, paths[0]);
    assert!(failed[0].error_message.contains("Failed twice"));
    assert_eq!(failed[1].path, paths[1]);
    assert!(failed[1].error_message.starts_with("Save error:"));
    assert_eq!(store.write_count(), 1);

    let retry = session.retry_job().expect("failures should be retryable");
    assert_eq!(retry.images, vec![paths[0].clone(), paths[1].clone()]);
    assert_eq!(retry.model, "llava:13b");
    assert_eq!(retry.prompt, "Describe");

    let report = session.report();
    assert_eq!(report.processed, 3);
    assert_eq!(report.successful, 1);
    assert!(!report.all_succeeded());

    // The retry is a fresh batch: counters and failures start over.
    run_with_session(&retry, &MockInferenceClient::new(), &mut session);
    assert!(session.failed_items().is_empty());
    let report = session.report();
    assert_eq!(report.total, 2);
    assert_eq!(report.successful, 2);
    assert!(report.all_succeeded());
}

#[test]
fn test_partial_save_failure_still_counts_as_success() {
    let client = MockInferenceClient::new();
    let job = BatchJob::new(vec!["img0.jpg".into()], "Describe", "llava");
    let store = Arc::new(MemoryResultStore::failing(&[ArtifactKind::Sidecar]));
    let selection = ArtifactSelection {
        text: true,
        sidecar: true,
        metadata: false,
        overwrite: true,
    };
    let mut session = BatchSession::new(store.clone(), selection);

    run_with_session(&job, &client, &mut session);

    assert!(session.failed_items().is_empty());
    assert_eq!(session.report().successful, 1);
    assert_eq!(store.writes().len(), 1);
    assert_eq!(store.writes()[0].0, ArtifactKind::Text);
}

#[test]
fn test_total_save_failure_is_recorded() {
    let client = MockInferenceClient::new();
    let job = BatchJob::new(vec!["img0.jpg".into()], "Describe", "llava");
    let store = Arc::new(MemoryResultStore::failing(&[ArtifactKind::Text]));
    let mut session = BatchSession::new(store, ArtifactSelection::default());

    run_with_session(&job, &client, &mut session);

    let failed = session.failed_items();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_message.contains("TXT"), "{}", failed[0].error_message);
}

#[test]
fn test_session_eta_after_first_item() {
    let job = BatchJob::new(
        (0..4).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect(),
        "Describe",
        "llava",
    );
    let mut session = BatchSession::new(
        Arc::new(MemoryResultStore::new()),
        ArtifactSelection::default(),
    );
    let start = Instant::now();
    session.begin(&job, start);
    assert!(session.eta(start).is_none());

    let client = MockInferenceClient::new();
    let (tx, rx) = mpsc::channel();
    run_batch(
        &BatchJob::new(vec![job.images[0].clone()], "Describe", "llava"),
        &client,
        &CancellationToken::new(),
        &tx,
    );
    drop(tx);
    for event in rx {
        if matches!(event, BatchEvent::ItemFinished { .. }) {
            session.handle(&event);
        }
    }

    assert_eq!(session.progress().completed(), 1);
    let eta = session
        .eta(start + std::time::Duration::from_secs(5))
        .unwrap();
    assert_eq!(eta.as_secs(), 15);
}
