//! Fail-fast GraphRAG pipeline

use std::sync::Arc;

use tracing::{debug, error, info};

use super::executor::GraphQueryExecutor;
use super::generator::LlmQueryGenerator;
use super::synthesizer::LlmResponseSynthesizer;
use super::types::{CandidateQuery, PipelineOutcome, PipelineStage, Question};
use super::validator::{LlmQueryValidator, Precheck};
use super::{QueryExecution, QueryGeneration, QueryValidation, ResponseSynthesis};
use crate::config::Config;
use crate::error::Result;
use crate::graph::{GraphEngine, SchemaSnapshot};
use crate::llm::{LanguageModel, SamplingParams};

/// Model and query settings for the default stages
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub temperature: f32,
    /// Token cap for generation and synthesis
    pub max_tokens: usize,
    /// Token cap for the one-line validation verdict
    pub validation_max_tokens: usize,
    /// `LIMIT` the generator is told to apply
    pub result_limit: usize,
    pub precheck: Option<Precheck>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            validation_max_tokens: config.llm.validation_max_tokens,
            result_limit: config.pipeline.result_limit,
            precheck: config.pipeline.syntax_precheck.then_some(Precheck {
                read_only: config.pipeline.read_only,
            }),
        }
    }

    fn sampling(&self, max_tokens: usize) -> SamplingParams {
        SamplingParams::new(self.temperature, max_tokens)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Question in, `{ query, response }` out
///
/// Stages run strictly in order; the first failure ends the run and later
/// stages are never invoked. The pipeline holds no per-request state, so
/// one instance can serve concurrent callers.
#[derive(Clone)]
pub struct GraphRagPipeline {
    schema: Arc<SchemaSnapshot>,
    generator: Arc<dyn QueryGeneration>,
    validator: Arc<dyn QueryValidation>,
    executor: Arc<dyn QueryExecution>,
    synthesizer: Arc<dyn ResponseSynthesis>,
}

impl GraphRagPipeline {
    /// Introspect the graph schema, then build the default stages
    pub async fn connect(
        llm: Arc<dyn LanguageModel>,
        graph: Arc<dyn GraphEngine>,
        settings: &PipelineSettings,
    ) -> Result<Self> {
        let schema = graph.describe_schema().await?;
        Ok(Self::new(Arc::new(schema), llm, graph, settings))
    }

    /// Build the default stages around an existing schema snapshot
    pub fn new(
        schema: Arc<SchemaSnapshot>,
        llm: Arc<dyn LanguageModel>,
        graph: Arc<dyn GraphEngine>,
        settings: &PipelineSettings,
    ) -> Self {
        let generator = LlmQueryGenerator::new(
            llm.clone(),
            settings.sampling(settings.max_tokens),
            settings.result_limit,
        );

        let mut validator =
            LlmQueryValidator::new(llm.clone(), settings.sampling(settings.validation_max_tokens));
        if let Some(precheck) = settings.precheck {
            validator = validator.with_precheck(precheck);
        }

        let synthesizer = LlmResponseSynthesizer::new(llm, settings.sampling(settings.max_tokens));

        Self::from_stages(
            schema,
            Arc::new(generator),
            Arc::new(validator),
            Arc::new(GraphQueryExecutor::new(graph)),
            Arc::new(synthesizer),
        )
    }

    /// Assemble a pipeline from arbitrary stage implementations
    pub fn from_stages(
        schema: Arc<SchemaSnapshot>,
        generator: Arc<dyn QueryGeneration>,
        validator: Arc<dyn QueryValidation>,
        executor: Arc<dyn QueryExecution>,
        synthesizer: Arc<dyn ResponseSynthesis>,
    ) -> Self {
        Self {
            schema,
            generator,
            validator,
            executor,
            synthesizer,
        }
    }

    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    /// Answer a question; failures are folded into the outcome
    pub async fn answer(&self, question: &str) -> PipelineOutcome {
        let mut stage = PipelineStage::Start;

        match self.drive(question, &mut stage).await {
            Ok((query, response)) => {
                info!(question = %question, query = %query, "Pipeline completed");
                PipelineOutcome::success(query, response)
            }
            Err(e) => {
                error!(
                    stage = stage.pending_step().unwrap_or("input"),
                    question = %question,
                    error = %e,
                    "Pipeline failed"
                );
                PipelineOutcome::failure(&e)
            }
        }
    }

    async fn drive(&self, question: &str, stage: &mut PipelineStage) -> Result<(CandidateQuery, String)> {
        let question = Question::new(question)?;

        let candidate = self.generator.generate(&question, &self.schema).await?;
        self.advance(stage);

        let query = self.validator.validate(candidate, &self.schema).await?;
        self.advance(stage);

        let records = self.executor.execute(&query).await?;
        self.advance(stage);

        let response = self.synthesizer.synthesize(&question, &records).await?;
        self.advance(stage);

        Ok((query, response))
    }

    fn advance(&self, stage: &mut PipelineStage) {
        *stage = stage.advance();
        debug!(stage = %stage, "Pipeline advanced");
    }
}

impl std::fmt::Debug for GraphRagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRagPipeline")
            .field("labels", &self.schema.node_labels.len())
            .field("relationship_types", &self.schema.relationship_types.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_default_config() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.max_tokens, 1000);
        assert_eq!(settings.validation_max_tokens, 100);
        assert_eq!(settings.result_limit, 5);
        assert_eq!(settings.precheck, Some(Precheck { read_only: true }));
        assert!((settings.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_settings_without_precheck() {
        let mut config = Config::default();
        config.pipeline.syntax_precheck = false;
        assert_eq!(PipelineSettings::from_config(&config).precheck, None);
    }
}
