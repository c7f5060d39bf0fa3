//! Ollama HTTP adapter for the inference port.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image_analyzer_core::ports::is_supported_image;
use image_analyzer_core::{AnalysisResult, InferenceClient, PerformanceMetrics};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Default Ollama server URL.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "llava";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Blocking client for an Ollama server.
///
/// The timeout applies to every request; nothing above this layer enforces
/// its own.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    http: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    images: [String; 1],
}

/// Body of a non-streaming `/api/chat` response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Assistant message.
    pub message: ResponseMessage,
    /// Whole request, nanoseconds.
    pub total_duration: Option<u64>,
    /// Model load, nanoseconds.
    pub load_duration: Option<u64>,
    /// Prompt tokens.
    pub prompt_eval_count: Option<u64>,
    /// Prompt evaluation, nanoseconds.
    pub prompt_eval_duration: Option<u64>,
    /// Generated tokens.
    pub eval_count: Option<u64>,
    /// Generation, nanoseconds.
    pub eval_duration: Option<u64>,
}

/// Message part of a chat response.
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    /// Generated text.
    #[serde(default)]
    pub content: String,
}

impl ChatResponse {
    /// Performance counters; absent fields stay `None`.
    #[must_use]
    pub const fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            total_duration_ns: self.total_duration,
            load_duration_ns: self.load_duration,
            prompt_tokens: self.prompt_eval_count,
            prompt_duration_ns: self.prompt_eval_duration,
            response_tokens: self.eval_count,
            response_duration_ns: self.eval_duration,
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    model: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Parses a `/api/chat` response body.
///
/// # Errors
///
/// Returns an error if the body is not a chat response.
pub fn parse_chat_response(body: &str) -> Result<ChatResponse> {
    serde_json::from_str(body).context("Invalid chat response from Ollama")
}

/// Parses a `/api/tags` response body into model names.
///
/// Each entry's `model` field is used, falling back to `name`; entries with
/// neither are skipped.
///
/// # Errors
///
/// Returns an error if the body is not a tags response.
pub fn parse_model_list(body: &str) -> Result<Vec<String>> {
    let tags: TagsResponse =
        serde_json::from_str(body).context("Invalid model list from Ollama")?;
    Ok(tags
        .models
        .into_iter()
        .filter_map(|m| m.model.or(m.name))
        .filter(|name| !name.is_empty())
        .collect())
}

impl OllamaClient {
    /// Creates a client for `host` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            host: host.into(),
            http,
        })
    }

    /// Server URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.host.trim_end_matches('/'))
    }

    fn get(&self, path: &str) -> Result<String> {
        let url = self.endpoint(path);
        let response = self
            .http
            .get(&url)
            .send()
            .with_context(|| format!("Could not reach Ollama at {}", self.host))?;
        read_body(response)
    }

    fn chat(&self, image: &Path, prompt: &str, model: &str) -> Result<ChatResponse> {
        let bytes = fs::read(image)
            .with_context(|| format!("Failed to read image: {}", image.display()))?;

        let request = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
                images: [STANDARD.encode(bytes)],
            }],
            stream: false,
        };

        let response = self
            .http
            .post(self.endpoint("api/chat"))
            .json(&request)
            .send()
            .with_context(|| format!("Could not reach Ollama at {}", self.host))?;

        parse_chat_response(&read_body(response)?)
    }
}

fn read_body(response: reqwest::blocking::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().context("Failed to read response body")?;
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(&body).map_or(body, |e| e.error);
        bail!("HTTP {status}: {detail}");
    }
    Ok(body)
}

impl InferenceClient for OllamaClient {
    fn analyze(&self, image: &Path, prompt: &str, model: &str) -> Result<AnalysisResult> {
        let source = Some(image.to_path_buf());

        if !image.exists() {
            let message = format!("Image file not found: {}", image.display());
            error!("{message}");
            return Ok(AnalysisResult::failed(model, source, message));
        }

        if !is_supported_image(image) {
            let ext = image
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            let message = format!("Unsupported image format: {ext}");
            error!("{message}");
            return Ok(AnalysisResult::failed(model, source, message));
        }

        let name = image.file_name().map_or_else(
            || image.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        info!("Analyzing {name} with model {model}");

        match self.chat(image, prompt, model) {
            Ok(response) => {
                let metrics = response.metrics();
                let chars = response.message.content.chars().count();
                match metrics.tokens_per_second() {
                    Some(tps) => info!(
                        "Analysis complete: {chars} chars, {} tokens, {tps:.2} tok/s",
                        metrics.response_tokens.unwrap_or_default()
                    ),
                    None => info!("Analysis complete: {chars} chars"),
                }
                Ok(AnalysisResult::succeeded(model, source, response.message.content)
                    .with_metrics(metrics))
            }
            Err(e) => {
                error!("Error analyzing {name}: {e:#}");
                Ok(AnalysisResult::failed(
                    model,
                    source,
                    format!("Analysis failed: {e:#}"),
                ))
            }
        }
    }

    fn test_connection(&self) -> bool {
        match self.get("api/tags") {
            Ok(_) => {
                info!("Successfully connected to Ollama at {}", self.host);
                true
            }
            Err(e) => {
                error!("Failed to connect to Ollama at {}: {e:#}", self.host);
                false
            }
        }
    }

    fn list_models(&self) -> Result<Vec<String>> {
        let body = self
            .get("api/tags")
            .with_context(|| format!("Could not retrieve models from {}", self.host))?;
        let models = parse_model_list(&body)?;
        debug!("Found {} models on Ollama server", models.len());
        Ok(models)
    }
}
