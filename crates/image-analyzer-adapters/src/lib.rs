//! Image Analyzer Adapters - External adapters for image-analyzer.
//!
//! This crate provides adapters for:
//! - The Ollama vision endpoint
//! - Filesystem persistence of text, YAML sidecar and EXIF artifacts
//! - Prompt files
//! - Image discovery

pub mod fs;
pub mod ollama;
pub mod prompt;
pub mod store;

pub use fs::discover_images;
pub use ollama::{OllamaClient, DEFAULT_HOST, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
pub use prompt::{resolve_prompt, PromptError, PromptStore, DEFAULT_PROMPT};
pub use store::{backup_path, numbered_path, sidecar_path, FsResultStore};
