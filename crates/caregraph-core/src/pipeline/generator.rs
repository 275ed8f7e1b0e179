//! Question to Cypher

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::prompts::generation_messages;
use super::types::{CandidateQuery, Question};
use super::{QueryGeneration, stage_error};
use crate::error::{Error, Result};
use crate::graph::SchemaSnapshot;
use crate::llm::{LanguageModel, SamplingParams};

/// Fence openers the model wraps queries in
const FENCES: [&str; 5] = ["```cypher", "```Cypher", "```CYPHER", "```sql", "```"];

/// Remove markdown code fences and surrounding whitespace
pub fn strip_code_fences(text: &str) -> String {
    FENCES
        .iter()
        .fold(text.to_string(), |acc, fence| acc.replace(fence, ""))
        .trim()
        .to_string()
}

/// Generator that prompts a language model with the schema
pub struct LlmQueryGenerator {
    llm: Arc<dyn LanguageModel>,
    params: SamplingParams,
    result_limit: usize,
}

impl LlmQueryGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, params: SamplingParams, result_limit: usize) -> Self {
        Self {
            llm,
            params,
            result_limit,
        }
    }
}

#[async_trait]
impl QueryGeneration for LlmQueryGenerator {
    async fn generate(&self, question: &Question, schema: &SchemaSnapshot) -> Result<CandidateQuery> {
        let messages = generation_messages(question, schema, self.result_limit);
        let reply = self
            .llm
            .complete(messages, &self.params)
            .await
            .map_err(|e| stage_error(e, Error::QueryGeneration))?;

        let query = strip_code_fences(&reply);
        if query.is_empty() {
            return Err(Error::QueryGeneration(
                "Model returned an empty query".to_string(),
            ));
        }

        debug!(query = %query, "Generated Cypher query");
        Ok(CandidateQuery::new(query))
    }
}
