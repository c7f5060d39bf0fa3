//! Progress bar adapter using indicatif.

use std::time::Duration;

use image_analyzer_core::{BatchEvent, EventSink};
use indicatif::{HumanDuration, ProgressBar as IndicatifBar, ProgressStyle};

/// Progress bar adapter for CLI output.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress bar.
    ///
    /// # Arguments
    ///
    /// * `total` - Number of images in the batch
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, show progress bar; otherwise show per-item status
    #[must_use]
    pub fn new(total: u64, quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = if show_bar {
            let bar = IndicatifBar::new(total);

            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }

            Some(bar)
        } else {
            None
        };

        Self { bar, quiet }
    }

    /// Shows the estimated remaining time and generation speed.
    pub fn set_stats(&self, eta: Option<Duration>, tokens_per_second: Option<f64>) {
        if let Some(bar) = &self.bar {
            bar.set_prefix(stats_prefix(eta, tokens_per_second));
        }
    }

    /// Prints a line without tearing the bar.
    pub fn println(&self, line: &str) {
        if self.quiet {
            return;
        }
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl EventSink for ProgressBar {
    fn on_event(&self, event: BatchEvent) {
        if self.quiet {
            return;
        }

        match event {
            BatchEvent::ItemStarted { index, total, path } => {
                let name = file_name(&path);
                if let Some(bar) = &self.bar {
                    bar.set_length(total as u64);
                    bar.set_position(index as u64);
                    bar.set_message(name);
                } else {
                    eprintln!("[{}/{}] Analyzing {name}", index + 1, total);
                }
            }
            BatchEvent::ItemRetrying { path, error } => {
                self.println(&format!("Retrying {}: {error}", file_name(&path)));
            }
            BatchEvent::ItemFinished { result, .. } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                if let Some(error) = result.error() {
                    let name = result
                        .source_image()
                        .map_or_else(|| "image".to_string(), file_name);
                    self.println(&format!("✗ {name}: {error}"));
                }
            }
            BatchEvent::BatchFinished {
                processed,
                successful,
            } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(format!(
                        "Done: {successful} of {processed} analyzed"
                    ));
                }
            }
            BatchEvent::BatchError { message } => {
                if let Some(bar) = &self.bar {
                    bar.abandon_with_message("Batch failed");
                }
                eprintln!("error: {message}");
            }
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// `(ETA 40 seconds, 12.5 tok/s)`, or empty when nothing is known yet.
fn stats_prefix(eta: Option<Duration>, tokens_per_second: Option<f64>) -> String {
    let mut parts = Vec::new();
    if let Some(eta) = eta {
        parts.push(format!("ETA {}", HumanDuration(eta)));
    }
    if let Some(tps) = tokens_per_second {
        parts.push(format!("{tps:.1} tok/s"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_prefix() {
        assert_eq!(stats_prefix(None, None), "");
        assert_eq!(stats_prefix(None, Some(12.54)), "(12.5 tok/s)");

        let eta = Duration::from_secs(40);
        assert_eq!(
            stats_prefix(Some(eta), Some(50.0)),
            format!("(ETA {}, 50.0 tok/s)", HumanDuration(eta))
        );
    }

    #[test]
    fn test_quiet_bar_ignores_events() {
        let bar = ProgressBar::new(3, true, true);
        bar.on_event(BatchEvent::BatchFinished {
            processed: 3,
            successful: 3,
        });
        bar.set_stats(Some(Duration::from_secs(1)), Some(10.0));
        assert!(bar.bar.is_none());
    }
}
