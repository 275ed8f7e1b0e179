//! Graph database access
//!
//! - `GraphEngine`: the seam the pipeline executes queries through
//! - `Neo4jClient`: HTTP Query API implementation
//! - `GraphValue`: database-native values and their normalization
//! - `SchemaSnapshot`: labels, relationship types and properties

mod client;
mod schema;
mod value;

use async_trait::async_trait;

use crate::error::Result;

pub use client::{Neo4jClient, parse_query_response};
pub use schema::{RelationshipPattern, SchemaSnapshot};
pub use value::{GraphNode, GraphRelationship, GraphValue};

/// One result row: column names with their values, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphRecord {
    fields: Vec<(String, GraphValue)>,
}

impl GraphRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    pub fn with(mut self, key: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, GraphValue)> for GraphRecord {
    fn from_iter<T: IntoIterator<Item = (String, GraphValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A graph database that accepts Cypher
#[async_trait]
pub trait GraphEngine: Send + Sync {
    /// Run a query and return its rows
    async fn run(&self, query: &str) -> Result<Vec<GraphRecord>>;

    /// Describe labels, relationship types and properties
    async fn describe_schema(&self) -> Result<SchemaSnapshot> {
        SchemaSnapshot::introspect(self).await
    }
}
