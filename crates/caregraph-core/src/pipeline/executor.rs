//! Runs validated queries against the graph

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::types::{CandidateQuery, ResultRecord};
use super::{QueryExecution, stage_error};
use crate::error::{Error, Result};
use crate::graph::GraphEngine;

/// Executor backed by a `GraphEngine`
pub struct GraphQueryExecutor {
    engine: Arc<dyn GraphEngine>,
}

impl GraphQueryExecutor {
    pub fn new(engine: Arc<dyn GraphEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl QueryExecution for GraphQueryExecutor {
    async fn execute(&self, query: &CandidateQuery) -> Result<Vec<ResultRecord>> {
        let rows = self
            .engine
            .run(query.as_str())
            .await
            .map_err(|e| stage_error(e, Error::QueryExecution))?;

        let records: Vec<ResultRecord> = rows.iter().map(ResultRecord::from_graph).collect();
        info!(query = %query, records = records.len(), "Query executed");
        Ok(records)
    }
}
