//! Types describing how analysis results are persisted.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::AnalysisResult;
use crate::validation::{validate_response, ValidationError};

/// Highest suffix tried when looking for a free numbered file name.
pub const MAX_NUMBERED_SUFFIX: u32 = 9999;

/// Kind of artifact written for a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Raw response in a `.txt` file.
    Text,
    /// YAML sidecar next to the image.
    Sidecar,
    /// Description embedded in the image's own metadata.
    Metadata,
}

impl ArtifactKind {
    /// Short label used in summaries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "TXT",
            Self::Sidecar => "YAML",
            Self::Metadata => "EXIF",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which artifacts to write for each successful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSelection {
    /// Write `{stem}.txt`.
    pub text: bool,
    /// Write `{name}.yml`.
    pub sidecar: bool,
    /// Embed the description in the image file.
    pub metadata: bool,
    /// Replace existing targets instead of picking `{stem}_{N}{ext}`.
    pub overwrite: bool,
}

impl Default for ArtifactSelection {
    fn default() -> Self {
        Self {
            text: true,
            sidecar: false,
            metadata: false,
            overwrite: true,
        }
    }
}

impl ArtifactSelection {
    /// Requested kinds, in write order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ArtifactKind> {
        let mut kinds = Vec::with_capacity(3);
        if self.sidecar {
            kinds.push(ArtifactKind::Sidecar);
        }
        if self.text {
            kinds.push(ArtifactKind::Text);
        }
        if self.metadata {
            kinds.push(ArtifactKind::Metadata);
        }
        kinds
    }

    /// Returns true if nothing is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.text && !self.sidecar && !self.metadata
    }
}

/// Error while persisting a single artifact.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The result is a failure and has nothing to save.
    #[error("Cannot save a failed analysis result")]
    FailedResult,
    /// The response did not pass validation.
    #[error("Response validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// No target path was given and the result has no source image.
    #[error("Cannot determine output path: no source image in result")]
    NoSourceImage,
    /// The image to annotate does not exist.
    #[error("Image file not found: {}", .0.display())]
    ImageNotFound(PathBuf),
    /// The image container cannot carry embedded metadata.
    #[error("Cannot embed metadata in {}: unsupported image format", .0.display())]
    UnsupportedContainer(PathBuf),
    /// No free numbered file name below the limit.
    #[error("Too many numbered files for {name}")]
    Exhausted {
        /// File name that was being numbered.
        name: String,
    },
    /// Serializing the artifact failed.
    #[error("Could not encode {kind}: {message}")]
    Encode {
        /// Artifact being written.
        kind: ArtifactKind,
        /// Encoder message.
        message: String,
    },
    /// Filesystem error.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl PersistError {
    /// Whether this error means the content was rejected rather than the
    /// write failing.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::FailedResult | Self::Validation(_))
    }

    fn rejection_copy(&self) -> Option<Self> {
        match self {
            Self::FailedResult => Some(Self::FailedResult),
            Self::Validation(e) => Some(Self::Validation(e.clone())),
            _ => None,
        }
    }
}

/// A successful result whose response passed validation.
///
/// Stores only accept this type, so nothing unvalidated can reach disk.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedResult<'a> {
    result: &'a AnalysisResult,
}

impl<'a> ValidatedResult<'a> {
    /// Checks that the result succeeded and its response is valid.
    ///
    /// # Errors
    ///
    /// [`PersistError::FailedResult`] for failed results,
    /// [`PersistError::Validation`] for rejected responses.
    pub fn new(result: &'a AnalysisResult) -> Result<Self, PersistError> {
        if !result.is_success() {
            return Err(PersistError::FailedResult);
        }
        validate_response(result.response())?;
        Ok(Self { result })
    }

    /// The wrapped result.
    #[must_use]
    pub const fn result(&self) -> &'a AnalysisResult {
        self.result
    }
}

/// Per-artifact results of persisting one analysis result.
#[derive(Debug, Default)]
pub struct PersistenceOutcome {
    artifacts: Vec<(ArtifactKind, Result<PathBuf, PersistError>)>,
}

impl PersistenceOutcome {
    /// Creates an empty outcome.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            artifacts: Vec::new(),
        }
    }

    /// Records the result of one artifact write.
    pub fn record(&mut self, kind: ArtifactKind, result: Result<PathBuf, PersistError>) {
        self.artifacts.push((kind, result));
    }

    /// Outcome in which every requested kind was rejected with `error`.
    #[must_use]
    pub fn rejected(kinds: &[ArtifactKind], error: &PersistError) -> Self {
        let mut outcome = Self::new();
        for &kind in kinds {
            let err = error.rejection_copy().unwrap_or(PersistError::FailedResult);
            outcome.record(kind, Err(err));
        }
        outcome
    }

    /// True if at least one requested artifact was saved.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.artifacts.iter().any(|(_, r)| r.is_ok())
    }

    /// Saved artifacts with their paths.
    pub fn saved(&self) -> impl Iterator<Item = (ArtifactKind, &PathBuf)> + '_ {
        self.artifacts
            .iter()
            .filter_map(|(kind, r)| r.as_ref().ok().map(|p| (*kind, p)))
    }

    /// Failed artifacts with their errors.
    pub fn errors(&self) -> impl Iterator<Item = (ArtifactKind, &PersistError)> + '_ {
        self.artifacts
            .iter()
            .filter_map(|(kind, r)| r.as_ref().err().map(|e| (*kind, e)))
    }

    /// Result for one kind, if it was requested.
    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> Option<&Result<PathBuf, PersistError>> {
        self.artifacts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r)
    }

    /// All failures joined into one line.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|(kind, e)| format!("{kind}: {e}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
