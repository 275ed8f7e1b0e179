//! OpenAI-compatible LLM client implementation
//!
//! Provides an async HTTP client for chat completions. Requests are
//! single-attempt: failures are reported to the caller, never retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::LanguageModel;
use super::types::{ChatRequest, ChatResponse, LlmResponse, Message, SamplingParams};

/// Chat completion client
///
/// Thread-safe; clones share the underlying connection pool.
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the LLM configuration
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the configured endpoint)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::ConfigError("LLM API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| config.endpoint.clone())
            .trim_end_matches('/')
            .to_string();

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url,
        })
    }
}

impl LlmClient {
    /// Create a new LlmClient with the given configuration and API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new().config(config).api_key(api_key).build()
    }

    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Get the configured model
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Make a chat completion request
    pub async fn chat(&self, messages: Vec<Message>, params: &SamplingParams) -> Result<LlmResponse> {
        let model = params.model.as_deref().unwrap_or(&self.config.model);

        let request = ChatRequest::new(model, messages)
            .with_temperature(params.temperature)
            .with_max_tokens(params.max_tokens);

        self.send_request(&request).await
    }

    /// Send a single request to the API
    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        let parsed = LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))?;

        debug!(model = %parsed.model, tokens = parsed.tokens_used, "Chat completion received");
        Ok(parsed)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, messages: Vec<Message>, params: &SamplingParams) -> Result<String> {
        self.chat(messages, params).await.map(|r| r.content)
    }
}

/// Map an unsuccessful HTTP status to an error
fn error_for_status(status: u16, body: &str) -> Error {
    match status {
        401 => Error::LLMError(
            "Unauthorized: Invalid API key. Set CAREGRAPH_API_KEY or GITHUB_TOKEN environment variable."
                .to_string(),
        ),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(60)),
        400 => Error::LLMError(format!("Bad request: {}", body)),
        403 => Error::LLMError(format!("Forbidden: {}", body)),
        404 => Error::LLMError(format!("Model not found or endpoint unavailable: {}", body)),
        500..=599 => Error::LLMError(format!("Server error ({}): {}", status, body)),
        _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
    }
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            json.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|v| v.as_u64())
        })
}
