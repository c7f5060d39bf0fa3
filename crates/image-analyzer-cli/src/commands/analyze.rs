//! Analyze command - describe images with a vision model.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Args;
use image_analyzer_adapters::{
    discover_images, resolve_prompt, FsResultStore, OllamaClient, DEFAULT_HOST, DEFAULT_MODEL,
    DEFAULT_TIMEOUT_SECS,
};
use image_analyzer_core::{
    spawn_batch, ArtifactSelection, BatchJob, BatchReport, BatchSession, CancellationToken,
    EventSink, InferenceClient,
};
use tracing::{debug, info, warn};

use super::{parse_host, ExitCode};
use crate::config::AppConfig;
use crate::output::ProgressBar;

/// Parse and validate a timeout in seconds.
fn parse_timeout(s: &str) -> Result<u64, String> {
    let value: u64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a whole number of seconds"))?;
    if value == 0 {
        Err("timeout must be at least 1 second".to_string())
    } else {
        Ok(value)
    }
}

/// Shared arguments for image analysis.
#[derive(Args, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnalyzeArgs {
    /// Image files or directories to analyze
    pub paths: Vec<PathBuf>,

    /// Ollama server URL
    #[arg(long, value_name = "URL", value_parser = parse_host)]
    pub host: Option<String>,

    /// Vision model name
    #[arg(short, long, value_name = "NAME")]
    pub model: Option<String>,

    /// Prompt file (default: built-in prompt)
    #[arg(short, long, value_name = "FILE")]
    pub prompt: Option<PathBuf>,

    /// Directory for text results (default: next to each image)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Keep existing result files and write numbered copies instead
    #[arg(long)]
    pub no_overwrite: bool,

    /// Write a YAML sidecar next to each image
    #[arg(long)]
    pub sidecar: bool,

    /// Embed the description in the image's EXIF metadata
    #[arg(long)]
    pub metadata: bool,

    /// Do not write text result files
    #[arg(long)]
    pub no_text: bool,

    /// Run the failed images once more after the batch
    #[arg(long)]
    pub retry_failed: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Suppress progress and summary output
    #[arg(short, long)]
    pub quiet: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Prompt file from the config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    configured_prompt: Option<PathBuf>,
}

impl AnalyzeArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    ///
    /// For boolean flags: an explicit CLI flag always wins. Config can
    /// enable/disable only when the flag wasn't passed.
    #[must_use]
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }

        // Server: CLI > config (accessor provides hardcoded fallback)
        args.host = args.host.or_else(|| config.ollama.host.clone());
        args.model = args.model.or_else(|| config.ollama.model.clone());
        args.timeout = args.timeout.or(config.ollama.timeout_seconds);

        // Prompt: the config file is only a fallback for --prompt
        args.configured_prompt.clone_from(&config.prompt.file);
        args.output_dir = args.output_dir.or_else(|| config.output.directory.clone());

        // Negative flags: config value is inverted
        if !args.no_overwrite {
            args.no_overwrite = config.output.overwrite.is_some_and(|o| !o);
        }
        if !args.no_text {
            args.no_text = config.output.text.is_some_and(|t| !t);
        }

        if !args.sidecar {
            args.sidecar = config.output.sidecar.unwrap_or(false);
        }
        if !args.metadata {
            args.metadata = config.output.metadata.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }

        args
    }

    /// Server URL with fallback to the default.
    fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Model name with fallback to the default.
    fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Request timeout with fallback to the default.
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Artifacts to write for each image.
    const fn selection(&self) -> ArtifactSelection {
        ArtifactSelection {
            text: !self.no_text,
            sidecar: self.sidecar,
            metadata: self.metadata,
            overwrite: !self.no_overwrite,
        }
    }
}

/// Result of running the analyze command.
pub struct AnalyzeResult {
    /// Exit code.
    pub exit_code: ExitCode,
}

/// Token of the batch currently running, cancelled on Ctrl-C.
#[derive(Clone, Default)]
struct InterruptSlot {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptSlot {
    fn install() -> Self {
        let slot = Self::default();
        let handler_slot = slot.clone();
        let installed = ctrlc::set_handler(move || {
            let current = handler_slot
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = current.as_ref() {
                eprintln!("\nStopping after the current image...");
                token.cancel();
            }
        });
        if let Err(e) = installed {
            warn!("Ctrl-C handler not installed: {e}");
        }
        slot
    }

    fn arm(&self, token: CancellationToken) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn disarm(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Run the analyze command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &AnalyzeArgs) -> Result<AnalyzeResult> {
    info!("Running analyze command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        bail!("No paths specified");
    }

    let selection = args.selection();
    if selection.is_empty() {
        warn!("All outputs disabled, results will not be saved");
    }

    let prompt = resolve_prompt(args.prompt.as_deref(), args.configured_prompt.as_deref())?;
    debug!("Prompt: {prompt}");

    let images = discover_images(&args.paths, args.recursive);
    if images.is_empty() {
        if !args.quiet {
            eprintln!("No supported images found");
        }
        return Ok(AnalyzeResult {
            exit_code: ExitCode::Success,
        });
    }
    info!("Found {} image(s)", images.len());

    let client = OllamaClient::new(args.host(), args.timeout())?;
    if !client.test_connection() {
        bail!(
            "Failed to connect to Ollama server at {}. Is Ollama running?",
            args.host()
        );
    }
    let client: Arc<dyn InferenceClient> = Arc::new(client);

    let store = args
        .output_dir
        .as_ref()
        .map_or_else(FsResultStore::new, |dir| {
            FsResultStore::new().with_output_dir(dir)
        });
    let mut session = BatchSession::new(Arc::new(store), selection);
    let interrupt = InterruptSlot::install();

    let job = BatchJob::new(images, prompt, args.model());
    let mut report = run_job(job, &client, &mut session, &interrupt, args)?;

    if args.retry_failed && !report.stopped_early() && report.fault.is_none() {
        if let Some(retry) = session.retry_job() {
            if !args.quiet {
                println!();
                println!("Retrying {} failed image(s)...", retry.len());
            }
            report = run_job(retry, &client, &mut session, &interrupt, args)?;
        }
    }

    let exit_code = if report.all_succeeded() {
        ExitCode::Success
    } else {
        ExitCode::Failures
    };

    Ok(AnalyzeResult { exit_code })
}

/// Runs one batch on the worker thread and drives the session from its
/// events.
fn run_job(
    job: BatchJob,
    client: &Arc<dyn InferenceClient>,
    session: &mut BatchSession,
    interrupt: &InterruptSlot,
    args: &AnalyzeArgs,
) -> Result<BatchReport> {
    // Determine if we should show progress
    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = ProgressBar::new(job.len() as u64, args.quiet, show_progress);

    session.begin(&job, Instant::now());
    let handle = spawn_batch(job, Arc::clone(client))?;
    interrupt.arm(handle.cancellation_token());

    for event in handle.events() {
        progress.on_event(event.clone());
        if let Some(outcome) = session.handle(&event) {
            for (kind, path) in outcome.saved() {
                debug!("Saved {} to {}", kind.label(), path.display());
            }
        }
        progress.set_stats(
            session.eta(Instant::now()),
            session.metrics().average_tokens_per_second(),
        );
    }

    interrupt.disarm();
    let summary = handle.join()?;
    debug!(
        "Batch worker finished: {} processed, {} successful, cancelled: {}",
        summary.processed, summary.successful, summary.cancelled
    );

    let report = session.report();
    if !args.quiet {
        println!();
        print!("{report}");
    }
    Ok(report)
}
