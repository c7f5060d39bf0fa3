//! Models command - list vision models on the server.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use image_analyzer_adapters::{OllamaClient, DEFAULT_HOST, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use image_analyzer_core::InferenceClient;

use super::parse_host;
use crate::config::AppConfig;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    /// Ollama server URL
    #[arg(long, value_name = "URL", value_parser = parse_host)]
    pub host: Option<String>,
}

/// Run the models command.
pub fn run(args: &ModelsArgs, config: &AppConfig) -> Result<()> {
    let host = args
        .host
        .as_deref()
        .or(config.ollama.host.as_deref())
        .unwrap_or(DEFAULT_HOST);
    let timeout = Duration::from_secs(config.ollama.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let client = OllamaClient::new(host, timeout)?;

    if !client.test_connection() {
        bail!("Failed to connect to Ollama server at {host}. Is Ollama running?");
    }

    let models = client.vision_models();
    let selected = config.ollama.model.as_deref().unwrap_or(DEFAULT_MODEL);

    println!("Ollama server: {host}");
    println!();

    if models.is_empty() {
        println!("No models installed. Pull one with `ollama pull {DEFAULT_MODEL}`.");
        return Ok(());
    }

    for name in &models {
        let marker = if is_selected(name, selected) { "✓" } else { " " };
        println!("  {marker} {name}");
    }

    println!();
    println!("{} model(s) available", models.len());

    Ok(())
}

/// Whether `name` is the configured model, treating a missing tag as `latest`.
fn is_selected(name: &str, selected: &str) -> bool {
    let with_tag = |s: &str| {
        if s.contains(':') {
            s.to_string()
        } else {
            format!("{s}:latest")
        }
    };
    with_tag(name) == with_tag(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_selected() {
        assert!(is_selected("llava:latest", "llava"));
        assert!(is_selected("llava", "llava"));
        assert!(is_selected("llava:13b", "llava:13b"));
        assert!(!is_selected("llava:13b", "llava"));
        assert!(!is_selected("moondream:latest", "llava"));
    }
}
