//! Prompt files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Prompt used when neither the command line nor the config names a file.
pub const DEFAULT_PROMPT: &str = "Describe this image in detail. Mention the main subject, \
the setting, notable objects, colors and lighting, and any visible text. \
Write plain prose in two or three short paragraphs.";

/// Error reading or writing a prompt file.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The file holds only whitespace.
    #[error("Prompt file is empty: {}", .0.display())]
    EmptyFile(PathBuf),
    /// Refused to save an empty prompt.
    #[error("Cannot save empty prompt")]
    EmptyPrompt,
    /// Filesystem error.
    #[error("Could not access prompt file {}: {source}", path.display())]
    Io {
        /// Prompt file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A prompt kept in a UTF-8 text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptStore {
    path: PathBuf,
}

impl PromptStore {
    /// Creates a store for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The prompt file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the prompt, trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is blank.
    pub fn load(&self) -> Result<String, PromptError> {
        let text = fs::read_to_string(&self.path).map_err(|source| PromptError::Io {
            path: self.path.clone(),
            source,
        })?;
        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(PromptError::EmptyFile(self.path.clone()));
        }
        debug!("Loaded prompt from {} ({} chars)", self.path.display(), prompt.len());
        Ok(prompt.to_string())
    }

    /// Writes the trimmed prompt plus a newline, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt is blank or the file cannot be written.
    pub fn save(&self, prompt: &str) -> Result<(), PromptError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PromptError::EmptyPrompt);
        }

        let io_err = |source| PromptError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, format!("{prompt}\n")).map_err(io_err)?;
        info!("Saved prompt to {}", self.path.display());
        Ok(())
    }
}

/// Picks the prompt: `explicit` file, then `configured` file, then
/// [`DEFAULT_PROMPT`].
///
/// # Errors
///
/// Returns an error if the chosen file cannot be loaded.
pub fn resolve_prompt(
    explicit: Option<&Path>,
    configured: Option<&Path>,
) -> Result<String, PromptError> {
    match explicit.or(configured) {
        Some(path) => PromptStore::new(path).load(),
        None => Ok(DEFAULT_PROMPT.to_string()),
    }
}
