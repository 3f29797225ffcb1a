//! Generation Backend Abstraction
//!
//! Unified interface over the external generation capability. Each backend
//! pairs `invoke` (send the rendered prompt, keep the raw envelope) with
//! `extract_text` (pull the generated text out of that envelope). The worker
//! only depends on this trait; the concrete adapter is picked once at
//! startup from `BackendConfig`.

use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod completion_text;
pub mod content_blocks;
pub mod prompt;

pub use completion_text::CompletionTextBackend;
pub use content_blocks::ContentBlocksBackend;

/// Unparsed backend reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status of the reply
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Sampling options sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_stop_sequences")]
    pub stop_sequences: Vec<String>,
}

fn default_max_tokens() -> u32 {
    20_000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_stop_sequences() -> Vec<String> {
    vec![crate::extract::END_MARKER.to_string()]
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop_sequences: default_stop_sequences(),
        }
    }
}

/// Generation backend trait
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send `prompt` and return the raw reply. Non-success statuses are
    /// mapped to errors here, so a returned response is always a 2xx.
    async fn invoke(&self, prompt: &str) -> Result<RawResponse, BackendError>;

    /// Pull the generated text out of a raw reply.
    fn extract_text(&self, response: &RawResponse) -> Result<String, BackendError>;

    /// Backend name for logs
    fn backend_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

/// Response envelope the backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Messages API replying with structured `content[]` blocks
    ContentBlocks,
    /// Completions API replying with `choices[0].text`
    CompletionText,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::ContentBlocks => "content_blocks",
            BackendKind::CompletionText => "completion_text",
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,

    pub model: String,

    /// Base URL; the adapter appends its own path
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Inline API key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub options: GenerationOptions,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::ContentBlocks,
            model: "claude-3-5-sonnet-20240620".to_string(),
            endpoint: None,
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            options: GenerationOptions::default(),
        }
    }
}

impl BackendConfig {
    /// API key from the inline value, falling back to `api_key_env`
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!(
                    "Endpoint must start with http:// or https://: {}",
                    endpoint
                ));
            }
        }
        if self.kind == BackendKind::CompletionText && self.endpoint.is_none() {
            return Err("completion_text backend requires an endpoint".to_string());
        }
        if self.options.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.options.temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.options.temperature
            ));
        }
        Ok(())
    }
}

/// Backend factory for creating backend clients
pub struct BackendFactory;

impl BackendFactory {
    pub fn create_backend(
        config: &BackendConfig,
    ) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        config.validate().map_err(BackendError::NotConfigured)?;
        match config.kind {
            BackendKind::ContentBlocks => {
                let api_key = config.resolve_api_key().ok_or_else(|| {
                    BackendError::NotConfigured(format!(
                        "content_blocks backend needs an API key (set api_key or {})",
                        config.api_key_env.as_deref().unwrap_or("api_key_env")
                    ))
                })?;
                Ok(Arc::new(ContentBlocksBackend::new(
                    config.model.clone(),
                    api_key,
                    config.endpoint.clone(),
                    config.options.clone(),
                )?))
            }
            BackendKind::CompletionText => {
                let endpoint = config.endpoint.clone().ok_or_else(|| {
                    BackendError::NotConfigured(
                        "completion_text backend requires an endpoint".to_string(),
                    )
                })?;
                Ok(Arc::new(CompletionTextBackend::new(
                    config.model.clone(),
                    endpoint,
                    config.resolve_api_key(),
                    config.options.clone(),
                )?))
            }
        }
    }
}

// Helper function to map transport errors to BackendError
pub(crate) fn map_http_error(error: reqwest::Error) -> BackendError {
    if let Some(status) = error.status() {
        return map_status_error(status, &error.to_string());
    }
    if error.is_timeout() {
        BackendError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        BackendError::RequestFailed(format!("Connection error: {}", error))
    } else {
        BackendError::ProviderError(format!("HTTP error: {}", error))
    }
}

/// Map a non-success status and its body text to a BackendError
pub(crate) fn map_status_error(status: StatusCode, error_text: &str) -> BackendError {
    match status.as_u16() {
        401 | 403 => BackendError::AuthFailed(format!("Authentication failed: {}", error_text)),
        429 => BackendError::RateLimit(format!("Rate limit exceeded: {}", error_text)),
        404 => BackendError::ModelNotFound(format!("Model not found: {}", error_text)),
        _ => BackendError::RequestFailed(format!(
            "Request failed with status {}: {}",
            status, error_text
        )),
    }
}

/// Read a reply into a RawResponse, turning non-2xx into an error
pub(crate) async fn read_response(response: reqwest::Response) -> Result<RawResponse, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(map_status_error(status, &error_text));
    }
    let body = response
        .text()
        .await
        .map_err(|e| BackendError::MalformedResponse(format!("Failed to read body: {}", e)))?;
    Ok(RawResponse {
        status: status.as_u16(),
        body,
    })
}

const BACKEND_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const BACKEND_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn build_backend_http_client() -> Result<Client, BackendError> {
    Client::builder()
        .connect_timeout(BACKEND_HTTP_CONNECT_TIMEOUT)
        .timeout(BACKEND_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BackendError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// Strip trailing slashes so paths can be appended with `/`
pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

// Mock backend for unit tests
#[cfg(test)]
pub struct MockBackend {
    responses: Vec<String>,
    current: parking_lot::Mutex<usize>,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            current: parking_lot::Mutex::new(0),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl GenerationBackend for MockBackend {
    async fn invoke(&self, _prompt: &str) -> Result<RawResponse, BackendError> {
        let mut idx = self.current.lock();
        let text = self
            .responses
            .get(*idx)
            .cloned()
            .unwrap_or_else(|| "Mock response".to_string());
        *idx += 1;
        Ok(RawResponse::ok(text))
    }

    fn extract_text(&self, response: &RawResponse) -> Result<String, BackendError> {
        Ok(response.body.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
