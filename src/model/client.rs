//! Chat-completions client for the model capability
//!
//! [`ModelClient`] is the seam between the conversation loop and inference.
//! [`ChatClient`] talks to any OpenAI-compatible endpoint over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::{ChatMessage, ModelRequest, ModelResponse};

/// Inference calls can be slow on long contexts
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1800);

/// Error type for chat operations
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Empty response from model")]
    EmptyResponse,
}

/// The external inference capability
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ChatError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `api_key` - Bearer token, omitted for local servers that need none
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ChatError> {
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?;

        Ok(ModelResponse {
            message: choice.message,
            finish_reason: choice.finish_reason,
        })
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
