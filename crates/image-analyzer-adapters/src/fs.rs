//! Filesystem adapter for finding images to analyze.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use image_analyzer_core::ports::is_supported_image;
use tracing::{debug, warn};

/// Collects supported images from files and directories.
///
/// Explicit files with an unsupported extension and missing paths are
/// skipped with a warning. Directories are scanned for supported images,
/// descending into subdirectories only when `recursive` is set. The result
/// is sorted and free of duplicates.
#[must_use]
pub fn discover_images(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                files.insert(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            collect_from_dir(path, recursive, &mut files);
        } else {
            warn!("Path does not exist: {}", path.display());
        }
    }

    debug!("Found {} image files", files.len());
    files.into_iter().collect()
}

fn collect_from_dir(dir: &Path, recursive: bool, files: &mut BTreeSet<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to read directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && is_supported_image(&path) {
            files.insert(path);
        } else if path.is_dir() && recursive {
            collect_from_dir(&path, recursive, files);
        }
    }
}
