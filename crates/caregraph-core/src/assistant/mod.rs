//! Conversational assistant
//!
//! Routes each question either through the GraphRAG pipeline or to a
//! general-knowledge answer, and records the turn in the history store.

mod prompts;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::history::{ConversationContext, HistoryStore, Turn};
use crate::llm::{LanguageModel, SamplingParams};
use crate::pipeline::{GraphRagPipeline, PipelineOutcome, PipelineSettings, Question};

pub use prompts::system_prompt;

/// Where a question gets answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// The GraphRAG pipeline over the hospital database
    Graph,
    /// Common medical knowledge, no database
    General,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::General => "general",
        }
    }

    /// Read a router reply; `None` when it names neither route
    pub fn from_reply(reply: &str) -> Option<Self> {
        let word = reply
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_uppercase();
        if word.starts_with("DATABASE") {
            Some(Self::Graph)
        } else if word.starts_with("GENERAL") {
            Some(Self::General)
        } else {
            None
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub thread_id: String,
    pub question: String,
    pub response: String,
    /// Cypher query consulted for this answer, if any
    pub query: Option<String>,
    pub route: Route,
}

/// Router over the pipeline and the general-knowledge fallback
pub struct Assistant {
    pipeline: Arc<GraphRagPipeline>,
    llm: Arc<dyn LanguageModel>,
    history: HistoryStore,
    answer_params: SamplingParams,
    route_params: SamplingParams,
}

impl Assistant {
    pub fn new(
        pipeline: Arc<GraphRagPipeline>,
        llm: Arc<dyn LanguageModel>,
        history: HistoryStore,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            pipeline,
            llm,
            history,
            answer_params: SamplingParams::new(settings.temperature, settings.max_tokens),
            route_params: SamplingParams::new(settings.temperature, settings.validation_max_tokens),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn pipeline(&self) -> &GraphRagPipeline {
        &self.pipeline
    }

    /// Answer a question within a thread, starting a new thread if none is given
    pub async fn chat(&self, thread_id: Option<&str>, question: &str) -> Result<ChatReply> {
        let question = Question::new(question)?;
        let thread_id = thread_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let turns = self.history.read(&thread_id).await.unwrap_or_else(|e| {
            warn!(thread_id = %thread_id, error = %e, "Could not load conversation history");
            Vec::new()
        });
        let context = ConversationContext::from_turns(&turns);

        let route = self.route(&question, &context).await;
        info!(thread_id = %thread_id, route = %route, "Routing question");

        let (response, query) = match route {
            Route::Graph => {
                let outcome = self.pipeline.answer(question.as_str()).await;
                if needs_fallback(&outcome) {
                    info!(thread_id = %thread_id, "No usable database answer, falling back to general knowledge");
                    (self.general_answer(&question, &context).await, outcome.query)
                } else {
                    (outcome.response, outcome.query)
                }
            }
            Route::General => (self.general_answer(&question, &context).await, None),
        };

        let turn = Turn::new(question.as_str(), &response)
            .with_query(query.clone())
            .with_route(route.as_str());
        if let Err(e) = self.history.append(&thread_id, &turn).await {
            error!(thread_id = %thread_id, error = %e, "Failed to store conversation turn");
        }

        Ok(ChatReply {
            thread_id,
            question: question.as_str().to_string(),
            response,
            query,
            route,
        })
    }

    /// Pick a route; anything unclear goes to the database
    pub async fn route(&self, question: &Question, context: &ConversationContext) -> Route {
        let messages = prompts::routing_messages(question, context);
        match self.llm.complete(messages, &self.route_params).await {
            Ok(reply) => Route::from_reply(&reply).unwrap_or_else(|| {
                warn!(reply = %reply, "Unrecognized routing reply, using the database");
                Route::Graph
            }),
            Err(e) => {
                warn!(error = %e, "Routing failed, using the database");
                Route::Graph
            }
        }
    }

    /// General medical-knowledge answer; failures become the answer text
    pub async fn general_answer(&self, question: &Question, context: &ConversationContext) -> String {
        let messages = prompts::general_messages(question, context);
        match self.llm.complete(messages, &self.answer_params).await {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                error!(question = %question, error = %e, "General answer failed");
                format!("Error generating response: {}", e)
            }
        }
    }
}

fn needs_fallback(outcome: &PipelineOutcome) -> bool {
    outcome.is_empty_result() || outcome.response.starts_with("Error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CandidateQuery;

    #[test]
    fn test_route_from_reply() {
        assert_eq!(Route::from_reply("DATABASE"), Some(Route::Graph));
        assert_eq!(Route::from_reply(" general.\n"), Some(Route::General));
        assert_eq!(Route::from_reply("**DATABASE**"), Some(Route::Graph));
        assert_eq!(Route::from_reply("I think so"), None);
        assert_eq!(Route::from_reply(""), None);
    }

    #[test]
    fn test_route_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Route::Graph).unwrap(), "\"graph\"");
        assert_eq!(Route::General.to_string(), "general");
    }

    #[test]
    fn test_needs_fallback() {
        let query = CandidateQuery::new("MATCH (n) RETURN n");
        assert!(needs_fallback(&PipelineOutcome::success(
            query.clone(),
            crate::pipeline::NO_INFORMATION
        )));
        assert!(needs_fallback(&PipelineOutcome::failure(&crate::Error::QueryExecution(
            "boom".into()
        ))));
        assert!(!needs_fallback(&PipelineOutcome::success(query, "John Doe")));
    }
}
