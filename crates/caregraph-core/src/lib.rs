//! CareGraph Core Library
//!
//! Question answering over a healthcare knowledge graph:
//! - GraphRAG pipeline (generate, validate, execute, synthesize)
//! - Graph database access (Neo4j HTTP Query API)
//! - LLM integration (OpenAI-compatible chat completions)
//! - Assistant routing between the database and general knowledge
//! - Conversation history (SQLite)

pub mod assistant;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod llm;
pub mod pipeline;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::assistant::{Assistant, ChatReply, Route};
    pub use crate::config::{Config, Credentials};
    pub use crate::error::{Error, Result};
    pub use crate::graph::{GraphEngine, Neo4jClient, SchemaSnapshot};
    pub use crate::history::HistoryStore;
    pub use crate::llm::{LanguageModel, LlmClient};
    pub use crate::pipeline::{GraphRagPipeline, PipelineOutcome, PipelineSettings};
}
