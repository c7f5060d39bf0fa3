//! CLI command definitions and handlers.

pub mod analyze;
pub mod config;
pub mod models;

use clap::{Parser, Subcommand};

/// Image Analyzer - Batch image descriptions with Ollama vision models
#[derive(Parser)]
#[command(name = "image-analyzer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shared analyze arguments (paths, output options, flags).
    #[command(flatten)]
    pub analyze: analyze::AnalyzeArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Describe images with a vision model
    Analyze(analyze::AnalyzeArgs),
    /// List vision models on the Ollama server
    Models(models::ModelsArgs),
    /// Show the effective configuration
    Config,
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every image was analyzed and saved.
    Success,
    /// At least one image failed or was not processed.
    Failures,
    /// Setup, connection, or argument error.
    Error,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        match code {
            ExitCode::Success => Self::SUCCESS,
            ExitCode::Failures => Self::from(1),
            ExitCode::Error => Self::from(2),
        }
    }
}

/// Parses `--host`, requiring an HTTP(S) URL.
pub(crate) fn parse_host(s: &str) -> Result<String, String> {
    crate::config::validate_host(s)?;
    Ok(s.to_string())
}
