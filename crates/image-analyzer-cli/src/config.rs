//! Configuration file support for image-analyzer.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/image-analyzer/config.toml` (lowest priority)
//! - Project-local: `.image-analyzer.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use image_analyzer_adapters::{DEFAULT_HOST, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of the project-local config file.
pub const PROJECT_CONFIG_NAME: &str = ".image-analyzer.toml";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Ollama server settings.
    pub ollama: OllamaConfig,
    /// Prompt settings.
    pub prompt: PromptConfig,
    /// Output settings.
    pub output: OutputConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Ollama server configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Server URL.
    pub host: Option<String>,
    /// Vision model name.
    pub model: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

/// Prompt configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Prompt file used when `--prompt` is not given.
    pub file: Option<PathBuf>,
}

/// Output configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for text results (default: next to each image).
    pub directory: Option<PathBuf>,
    /// Replace existing result files.
    pub overwrite: Option<bool>,
    /// Write `{stem}.txt`.
    pub text: Option<bool>,
    /// Write a YAML sidecar.
    pub sidecar: Option<bool>,
    /// Embed the description in image metadata.
    pub metadata: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/image-analyzer/config.toml`
    /// 2. Project-local: `.image-analyzer.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are dropped with a
    /// warning.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load XDG config (lowest priority)
        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        // Load project-local config (higher priority, merged)
        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        for warning in config.validate() {
            eprintln!("warning: {warning}");
        }

        config
    }

    /// Drops out-of-range values and describes each one.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(host) = self.ollama.host.take() {
            match validate_host(&host) {
                Ok(()) => self.ollama.host = Some(host),
                Err(e) => warnings.push(format!("ollama.host ignored: {e}")),
            }
        }

        if self.ollama.timeout_seconds == Some(0) {
            self.ollama.timeout_seconds = None;
            warnings.push("ollama.timeout_seconds ignored: must be at least 1".to_string());
        }

        if self.ollama.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            self.ollama.model = None;
            warnings.push("ollama.model ignored: must not be empty".to_string());
        }

        warnings
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Self) {
        // General
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        // Ollama
        self.ollama.host = other.ollama.host.or_else(|| self.ollama.host.take());
        self.ollama.model = other.ollama.model.or_else(|| self.ollama.model.take());
        self.ollama.timeout_seconds = other
            .ollama
            .timeout_seconds
            .or(self.ollama.timeout_seconds);

        // Prompt
        self.prompt.file = other.prompt.file.or_else(|| self.prompt.file.take());

        // Output
        self.output.directory = other
            .output
            .directory
            .or_else(|| self.output.directory.take());
        self.output.overwrite = other.output.overwrite.or(self.output.overwrite);
        self.output.text = other.output.text.or(self.output.text);
        self.output.sidecar = other.output.sidecar.or(self.output.sidecar);
        self.output.metadata = other.output.metadata.or(self.output.metadata);
        self.output.progress = other.output.progress.or(self.output.progress);
    }

    /// Copy with every unset value replaced by its hard-coded default.
    #[must_use]
    pub fn with_defaults(&self) -> Self {
        let mut config = Self {
            general: GeneralConfig {
                recursive: Some(false),
            },
            ollama: OllamaConfig {
                host: Some(DEFAULT_HOST.to_string()),
                model: Some(DEFAULT_MODEL.to_string()),
                timeout_seconds: Some(DEFAULT_TIMEOUT_SECS),
            },
            prompt: PromptConfig::default(),
            output: OutputConfig {
                directory: None,
                overwrite: Some(true),
                text: Some(true),
                sidecar: Some(false),
                metadata: Some(false),
                progress: Some(false),
            },
        };
        config.merge(self.clone());
        config
    }
}

/// Checks that a host URL uses HTTP(S).
///
/// # Errors
///
/// Returns a description of the problem.
pub fn validate_host(host: &str) -> Result<(), String> {
    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("'{host}' must start with http:// or https://"))
    }
}

/// Get the XDG config file path.
pub fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("image-analyzer").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
pub fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.image-analyzer.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(PROJECT_CONFIG_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
