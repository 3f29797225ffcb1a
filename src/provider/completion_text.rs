//! Completions-style backend replying with raw completion text.
//!
//! Speaks the OpenAI-compatible `/completions` shape, which most local
//! inference servers implement. The API key is optional.

use super::{
    build_backend_http_client, map_http_error, normalize_base_url, read_response,
    GenerationBackend, GenerationOptions, RawResponse,
};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    text: String,
}

pub struct CompletionTextBackend {
    client: Client,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    options: GenerationOptions,
}

impl CompletionTextBackend {
    pub fn new(
        model: String,
        endpoint: String,
        api_key: Option<String>,
        options: GenerationOptions,
    ) -> Result<Self, BackendError> {
        let client = build_backend_http_client()?;
        Ok(Self {
            client,
            model,
            endpoint: normalize_base_url(&endpoint),
            api_key,
            options,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stop: &self.options.stop_sequences,
            stream: false,
        }
    }
}

#[async_trait]
impl GenerationBackend for CompletionTextBackend {
    async fn invoke(&self, prompt: &str) -> Result<RawResponse, BackendError> {
        let url = format!("{}/completions", self.endpoint);
        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(map_http_error)?;

        read_response(response).await
    }

    fn extract_text(&self, response: &RawResponse) -> Result<String, BackendError> {
        let parsed: CompletionResponse = serde_json::from_str(&response.body).map_err(|e| {
            BackendError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| BackendError::MalformedResponse("No choices in response".to_string()))
    }

    fn backend_name(&self) -> &str {
        "completion_text"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
