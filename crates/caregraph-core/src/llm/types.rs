//! LLM types for OpenAI-compatible chat completion APIs

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions/context)
    System,
    /// User message (human input)
    User,
    /// Assistant message (LLM response)
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Per-call sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Model identifier; `None` uses the client's configured model
    pub model: Option<String>,
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl SamplingParams {
    pub fn new(temperature: f32, max_tokens: usize) -> Self {
        Self {
            model: None,
            temperature,
            max_tokens,
        }
    }

    /// Pin a specific model for this call
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::new(0.3, 1000)
    }
}

/// Request body for chat completions
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier (e.g., "gpt-4o-mini")
    pub model: String,
    /// List of messages in the conversation
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl ChatRequest {
    /// Create a new chat request with required fields
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage information from the API response
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    #[serde(other)]
    Unknown,
}

/// Message payload inside a completion choice
///
/// `content` may be null when a provider filters the output.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
}

/// A single completion choice from the API response
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: usize,
    pub message: ChoiceMessage,
    pub finish_reason: Option<FinishReason>,
}

/// Response from the chat completions API
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

/// Simplified response returned by the LLM client
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated content, trimmed
    pub content: String,
    /// Model that generated the response
    pub model: String,
    /// Total tokens used (input + output)
    pub tokens_used: u32,
    pub finish_reason: FinishReason,
}

impl LlmResponse {
    /// Build from an API response; `None` when there is no usable choice
    pub fn from_chat_response(response: ChatResponse) -> Option<Self> {
        let choice = response.choices.into_iter().next()?;
        let content = choice.message.content?;

        Some(Self {
            content: content.trim().to_string(),
            model: response.model,
            tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
            finish_reason: choice.finish_reason.unwrap_or(FinishReason::Unknown),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, MessageRole::System);
        assert_eq!(Message::user("u").role, MessageRole::User);
        assert_eq!(Message::assistant("a").content, "a");
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")])
            .with_temperature(0.3)
            .with_max_tokens(100);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 100);

        let bare = serde_json::to_value(ChatRequest::new("m", vec![])).unwrap();
        assert!(bare.get("temperature").is_none());
    }

    #[test]
    fn test_llm_response_from_chat_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "  VALID \n"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        let parsed = LlmResponse::from_chat_response(response).unwrap();
        assert_eq!(parsed.content, "VALID");
        assert_eq!(parsed.tokens_used, 13);
        assert_eq!(parsed.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_llm_response_without_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null},
                      "finish_reason": "content_filter"}]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(LlmResponse::from_chat_response(response).is_none());

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(LlmResponse::from_chat_response(empty).is_none());
    }

    #[test]
    fn test_unknown_finish_reason() {
        let reason: FinishReason = serde_json::from_str(r#""tool_calls""#).unwrap();
        assert_eq!(reason, FinishReason::Unknown);
    }
}
