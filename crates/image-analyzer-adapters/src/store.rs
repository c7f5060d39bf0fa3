//! Filesystem adapter for result artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use image_analyzer_core::domain::MAX_NUMBERED_SUFFIX;
use image_analyzer_core::{ArtifactKind, PersistError, ResultStore, ValidatedResult};
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Charset marker for an EXIF `UserComment` with undefined encoding.
const USER_COMMENT_CHARSET: [u8; 8] = [0; 8];

/// Extensions whose containers can hold EXIF (lowercase, without dot).
const METADATA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff"];

/// Whether EXIF can be embedded in `path`, judged by its extension.
fn supports_embedded_metadata(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| METADATA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Writes text files, YAML sidecars and embedded EXIF descriptions.
///
/// Text files go next to the image unless an output directory is set.
/// Sidecars and backups always sit next to the image.
#[derive(Debug, Clone, Default)]
pub struct FsResultStore {
    output_dir: Option<PathBuf>,
}

/// PhotoPrism-compatible sidecar document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Sidecar<'a> {
    title: String,
    description: &'a str,
    taken_at: String,
    details: SidecarDetails<'a>,
}

#[derive(Debug, Serialize)]
struct SidecarDetails<'a> {
    #[serde(rename = "AI_Model")]
    model: &'a str,
    #[serde(rename = "AI_Generated")]
    generated: bool,
    #[serde(rename = "Processing_Time")]
    processing_time: Option<f64>,
}

impl FsResultStore {
    /// Creates a store that writes next to each image.
    #[must_use]
    pub const fn new() -> Self {
        Self { output_dir: None }
    }

    /// Sends text artifacts to `dir` instead of next to the image.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Configured output directory for text artifacts.
    #[must_use]
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Default text path for an image: `{stem}.txt`.
    #[must_use]
    pub fn text_path(&self, image: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => {
                let stem = image.file_stem().unwrap_or(image.as_os_str());
                dir.join(format!("{}.txt", stem.to_string_lossy()))
            }
            None => image.with_extension("txt"),
        }
    }
}

/// Sidecar path for an image: `{name}.yml`, e.g. `photo.jpg.yml`.
#[must_use]
pub fn sidecar_path(image: &Path) -> PathBuf {
    append_extension(image, "yml")
}

/// Backup path for an image: `{name}.bak`.
#[must_use]
pub fn backup_path(image: &Path) -> PathBuf {
    append_extension(image, "bak")
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Returns `path` if free, else the first free `{stem}_{N}{ext}`.
///
/// # Errors
///
/// [`PersistError::Exhausted`] if every suffix up to the limit is taken.
pub fn numbered_path(path: &Path) -> Result<PathBuf, PersistError> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_NUMBERED_SUFFIX)
        .map(|n| path.with_file_name(format!("{stem}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| PersistError::Exhausted {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
}

/// Picks the final path for an artifact and creates its parent directory.
fn prepare_target(path: PathBuf, overwrite: bool) -> Result<PathBuf, PersistError> {
    let path = if !overwrite && path.exists() {
        let numbered = numbered_path(&path)?;
        info!("File exists, using numbered path: {}", numbered.display());
        numbered
    } else {
        path
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(path)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    fs::write(path, contents).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl ResultStore for FsResultStore {
    fn save_text(
        &self,
        result: &ValidatedResult<'_>,
        target: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf, PersistError> {
        let result = result.result();
        let default = match target {
            Some(path) => path.to_path_buf(),
            None => self.text_path(result.source_image().ok_or(PersistError::NoSourceImage)?),
        };
        let path = prepare_target(default, overwrite)?;

        write_file(&path, result.response().as_bytes())?;
        info!("Saved analysis result to {}", path.display());
        Ok(path)
    }

    fn save_sidecar(
        &self,
        result: &ValidatedResult<'_>,
        target: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf, PersistError> {
        let result = result.result();
        let default = match target {
            Some(path) => path.to_path_buf(),
            None => sidecar_path(result.source_image().ok_or(PersistError::NoSourceImage)?),
        };
        let path = prepare_target(default, overwrite)?;

        let taken_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let doc = Sidecar {
            title: result
                .source_image()
                .and_then(Path::file_stem)
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            description: result.response(),
            taken_at,
            details: SidecarDetails {
                model: result.model(),
                generated: true,
                processing_time: result.total_seconds(),
            },
        };
        let yaml = serde_yaml::to_string(&doc).map_err(|e| PersistError::Encode {
            kind: ArtifactKind::Sidecar,
            message: e.to_string(),
        })?;

        write_file(&path, yaml.as_bytes())?;
        info!("Saved YAML sidecar to {}", path.display());
        Ok(path)
    }

    fn write_metadata(&self, result: &ValidatedResult<'_>) -> Result<PathBuf, PersistError> {
        let result = result.result();
        let image = result.source_image().ok_or(PersistError::NoSourceImage)?;
        if !image.exists() {
            return Err(PersistError::ImageNotFound(image.to_path_buf()));
        }
        if !supports_embedded_metadata(image) {
            return Err(PersistError::UnsupportedContainer(image.to_path_buf()));
        }

        let backup = backup_path(image);
        if !backup.exists() {
            fs::copy(image, &backup).map_err(|source| PersistError::Io {
                path: backup.clone(),
                source,
            })?;
            info!("Created backup at {}", backup.display());
        }

        let mut metadata = Metadata::new_from_path(image).unwrap_or_else(|e| {
            warn!("Could not load existing EXIF data: {e}, creating new");
            Metadata::new()
        });

        let description = result.response();
        let mut comment = USER_COMMENT_CHARSET.to_vec();
        comment.extend_from_slice(description.as_bytes());
        metadata.set_tag(ExifTag::ImageDescription(description.to_string()));
        metadata.set_tag(ExifTag::UserComment(comment));

        metadata
            .write_to_file(image)
            .map_err(|source| PersistError::Io {
                path: image.to_path_buf(),
                source,
            })?;
        info!("Wrote metadata to {}", image.display());
        Ok(image.to_path_buf())
    }
}
