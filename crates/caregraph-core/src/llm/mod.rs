//! LLM integration - OpenAI-compatible chat completions
//!
//! This module provides:
//! - The `LanguageModel` seam every pipeline stage talks to
//! - An HTTP client for chat completions
//! - Request/response types matching the OpenAI-compatible API

mod client;
mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::{LlmClient, LlmClientBuilder};
pub use types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, LlmResponse, Message,
    MessageRole, SamplingParams, Usage,
};

/// A hosted chat model: role-tagged messages in, generated text out
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the given messages
    async fn complete(&self, messages: Vec<Message>, params: &SamplingParams) -> Result<String>;
}
