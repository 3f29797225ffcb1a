//! Messages-style backend replying with structured content blocks.

use super::{
    build_backend_http_client, map_http_error, normalize_base_url, read_response,
    GenerationBackend, GenerationOptions, RawResponse,
};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct ContentBlocksBackend {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
    options: GenerationOptions,
}

impl ContentBlocksBackend {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        options: GenerationOptions,
    ) -> Result<Self, BackendError> {
        let client = build_backend_http_client()?;
        let base_url = normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        Ok(Self {
            client,
            model,
            api_key,
            base_url,
            options,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stop_sequences: &self.options.stop_sequences,
            messages: vec![UserMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[async_trait]
impl GenerationBackend for ContentBlocksBackend {
    async fn invoke(&self, prompt: &str) -> Result<RawResponse, BackendError> {
        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(map_http_error)?;

        read_response(response).await
    }

    /// Concatenate the text of every `text` block, in order.
    fn extract_text(&self, response: &RawResponse) -> Result<String, BackendError> {
        let parsed: MessagesResponse = serde_json::from_str(&response.body).map_err(|e| {
            BackendError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;
        Ok(parsed
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect())
    }

    fn backend_name(&self) -> &str {
        "content_blocks"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
