//! Result persistence port.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{
    AnalysisResult, ArtifactKind, ArtifactSelection, PersistError, PersistenceOutcome,
    ValidatedResult,
};

/// Port for writing result artifacts.
///
/// The three operations are independent: a failure in one never prevents
/// the others.
pub trait ResultStore: Send + Sync {
    /// Writes the raw response as plain text.
    ///
    /// Without `target`, the path is derived from the source image.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if no path can be derived or writing fails.
    fn save_text(
        &self,
        result: &ValidatedResult<'_>,
        target: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf, PersistError>;

    /// Writes a structured YAML sidecar.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if no path can be derived, encoding fails,
    /// or writing fails.
    fn save_sidecar(
        &self,
        result: &ValidatedResult<'_>,
        target: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf, PersistError>;

    /// Embeds the description in the source image's metadata, backing the
    /// original up first.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the image is missing or cannot be
    /// rewritten.
    fn write_metadata(&self, result: &ValidatedResult<'_>) -> Result<PathBuf, PersistError>;
}

/// Writes every requested artifact for `result`.
///
/// The response is validated once up front; a rejection fails every
/// requested kind without touching the store.
pub fn persist_result(
    store: &dyn ResultStore,
    result: &AnalysisResult,
    selection: &ArtifactSelection,
) -> PersistenceOutcome {
    let kinds = selection.kinds();
    let validated = match ValidatedResult::new(result) {
        Ok(v) => v,
        Err(e) => {
            warn!("{e}");
            return PersistenceOutcome::rejected(&kinds, &e);
        }
    };

    let mut outcome = PersistenceOutcome::new();
    for kind in kinds {
        let saved = match kind {
            ArtifactKind::Text => store.save_text(&validated, None, selection.overwrite),
            ArtifactKind::Sidecar => store.save_sidecar(&validated, None, selection.overwrite),
            ArtifactKind::Metadata => store.write_metadata(&validated),
        };
        match &saved {
            Ok(path) => debug!("Saved {kind} to {}", path.display()),
            Err(e) => warn!("Failed to save {kind}: {e}"),
        }
        outcome.record(kind, saved);
    }
    outcome
}
