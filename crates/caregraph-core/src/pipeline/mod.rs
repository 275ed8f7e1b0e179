//! GraphRAG pipeline: question to Cypher to records to answer
//!
//! Four stages run in order behind trait seams, so any of them can be
//! swapped for a stub:
//! - `QueryGeneration`: question + schema to a candidate Cypher query
//! - `QueryValidation`: candidate to accepted query, or rejection
//! - `QueryExecution`: accepted query to normalized records
//! - `ResponseSynthesis`: question + records to a natural-language answer
//!
//! `GraphRagPipeline` drives them and folds any failure into a
//! `PipelineOutcome` whose response reads `Error: <cause>`.

mod executor;
mod generator;
mod orchestrator;
mod prompts;
mod synthesizer;
mod types;
mod validator;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::graph::SchemaSnapshot;

pub use executor::GraphQueryExecutor;
pub use generator::{LlmQueryGenerator, strip_code_fences};
pub use orchestrator::{GraphRagPipeline, PipelineSettings};
pub use synthesizer::LlmResponseSynthesizer;
pub use types::{
    CandidateQuery, NO_INFORMATION, PipelineOutcome, PipelineStage, Question, ResultRecord,
    ValidationVerdict,
};
pub use validator::{LlmQueryValidator, Precheck, precheck};

#[async_trait]
pub trait QueryGeneration: Send + Sync {
    async fn generate(&self, question: &Question, schema: &SchemaSnapshot) -> Result<CandidateQuery>;
}

#[async_trait]
pub trait QueryValidation: Send + Sync {
    /// Return the query unchanged when accepted
    async fn validate(&self, query: CandidateQuery, schema: &SchemaSnapshot) -> Result<CandidateQuery>;
}

#[async_trait]
pub trait QueryExecution: Send + Sync {
    /// An empty result is `Ok(vec![])`, not an error
    async fn execute(&self, query: &CandidateQuery) -> Result<Vec<ResultRecord>>;
}

#[async_trait]
pub trait ResponseSynthesis: Send + Sync {
    async fn synthesize(&self, question: &Question, records: &[ResultRecord]) -> Result<String>;
}

/// Attribute an upstream failure to a stage, keeping stage errors as-is
fn stage_error(error: Error, stage: fn(String) -> Error) -> Error {
    if error.is_stage_error() {
        error
    } else {
        stage(error.to_string())
    }
}
