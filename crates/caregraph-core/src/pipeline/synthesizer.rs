//! Records to a natural-language answer

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::prompts::synthesis_messages;
use super::types::{NO_INFORMATION, Question, ResultRecord};
use super::{ResponseSynthesis, stage_error};
use crate::error::{Error, Result};
use crate::llm::{LanguageModel, SamplingParams};

/// Synthesizer that asks a language model to phrase the records
pub struct LlmResponseSynthesizer {
    llm: Arc<dyn LanguageModel>,
    params: SamplingParams,
}

impl LlmResponseSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>, params: SamplingParams) -> Self {
        Self { llm, params }
    }
}

#[async_trait]
impl ResponseSynthesis for LlmResponseSynthesizer {
    async fn synthesize(&self, question: &Question, records: &[ResultRecord]) -> Result<String> {
        if records.is_empty() {
            debug!(question = %question, "No records, skipping synthesis");
            return Ok(NO_INFORMATION.to_string());
        }

        let messages = synthesis_messages(question, records);
        let reply = self
            .llm
            .complete(messages, &self.params)
            .await
            .map_err(|e| stage_error(e, Error::ResponseSynthesis))?;

        Ok(reply.trim().to_string())
    }
}
