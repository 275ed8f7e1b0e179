//! Read-only description of the graph's structure

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{GraphEngine, GraphRecord, GraphValue};
use crate::error::Result;

const NODE_PROPERTIES_QUERY: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName RETURN nodeLabels, propertyName";

const RELATIONSHIP_PROPERTIES_QUERY: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName RETURN relType, propertyName";

const RELATIONSHIP_PATTERNS_QUERY: &str = "MATCH (a)-[r]->(b) \
     WITH DISTINCT labels(a) AS sources, type(r) AS rel_type, labels(b) AS targets \
     UNWIND sources AS source UNWIND targets AS target \
     RETURN DISTINCT source, rel_type, target";

/// A `(:Source)-[:TYPE]->(:Target)` pattern present in the graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub source: String,
    pub rel_type: String,
    pub target: String,
}

/// Node labels, relationship types and their properties
///
/// Captured once and shared read-only; it is never refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub node_labels: BTreeMap<String, BTreeSet<String>>,
    pub relationship_types: BTreeMap<String, BTreeSet<String>>,
    pub relationships: BTreeSet<RelationshipPattern>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node label with its property names
    pub fn with_node<I, S>(mut self, label: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_labels
            .entry(label.into())
            .or_default()
            .extend(properties.into_iter().map(Into::into));
        self
    }

    /// Add a relationship pattern; the type is registered as well
    pub fn with_relationship(
        mut self,
        source: impl Into<String>,
        rel_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let rel_type = rel_type.into();
        self.relationship_types.entry(rel_type.clone()).or_default();
        self.relationships.insert(RelationshipPattern {
            source: source.into(),
            rel_type,
            target: target.into(),
        });
        self
    }

    /// Add property names to a relationship type
    pub fn with_relationship_properties<I, S>(mut self, rel_type: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationship_types
            .entry(rel_type.into())
            .or_default()
            .extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.node_labels.is_empty() && self.relationship_types.is_empty()
    }

    /// Node labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.node_labels.keys().map(String::as_str)
    }

    /// Relationship type names in sorted order
    pub fn relationship_type_names(&self) -> impl Iterator<Item = &str> {
        self.relationship_types.keys().map(String::as_str)
    }

    /// Labels with their properties, e.g. `Patient(age, name), Doctor(name)`
    pub fn label_summary(&self) -> String {
        self.node_labels
            .iter()
            .map(|(label, props)| {
                if props.is_empty() {
                    label.clone()
                } else {
                    let props: Vec<&str> = props.iter().map(String::as_str).collect();
                    format!("{}({})", label, props.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Relationship types, comma separated
    pub fn relationship_summary(&self) -> String {
        self.relationship_type_names().collect::<Vec<_>>().join(", ")
    }

    /// Build a snapshot by introspecting a live database
    pub async fn introspect<E: GraphEngine + ?Sized>(engine: &E) -> Result<Self> {
        let mut schema = Self::new();

        for record in engine.run(NODE_PROPERTIES_QUERY).await? {
            let labels: Vec<String> = record
                .get("nodeLabels")
                .and_then(GraphValue::as_list)
                .map(|items| items.iter().filter_map(|l| l.as_str()).map(str::to_string).collect())
                .unwrap_or_default();
            let property = property_name(&record);

            for label in labels {
                let entry = schema.node_labels.entry(label).or_default();
                if let Some(property) = &property {
                    entry.insert(property.clone());
                }
            }
        }

        for record in engine.run(RELATIONSHIP_PROPERTIES_QUERY).await? {
            let Some(rel_type) = record.get("relType").and_then(GraphValue::as_str) else {
                continue;
            };
            let entry = schema
                .relationship_types
                .entry(clean_rel_type(rel_type))
                .or_default();
            if let Some(property) = property_name(&record) {
                entry.insert(property);
            }
        }

        for record in engine.run(RELATIONSHIP_PATTERNS_QUERY).await? {
            let field = |name| record.get(name).and_then(GraphValue::as_str);
            if let (Some(source), Some(rel_type), Some(target)) =
                (field("source"), field("rel_type"), field("target"))
            {
                schema = schema.with_relationship(source, rel_type, target);
            }
        }

        info!(
            labels = schema.node_labels.len(),
            relationship_types = schema.relationship_types.len(),
            patterns = schema.relationships.len(),
            "Graph schema loaded"
        );

        Ok(schema)
    }
}

fn property_name(record: &GraphRecord) -> Option<String> {
    record
        .get("propertyName")
        .and_then(GraphValue::as_str)
        .map(str::to_string)
}

/// `relTypeProperties` reports types as ``:`HAS_DISEASE` ``
fn clean_rel_type(raw: &str) -> String {
    raw.trim_start_matches(':').trim_matches('`').to_string()
}

fn write_properties(f: &mut fmt::Formatter<'_>, name: &str, props: &BTreeSet<String>) -> fmt::Result {
    let props: Vec<&str> = props.iter().map(String::as_str).collect();
    writeln!(f, "{} {{{}}}", name, props.join(", "))
}

impl fmt::Display for SchemaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node properties:")?;
        for (label, props) in &self.node_labels {
            write_properties(f, label, props)?;
        }

        writeln!(f, "Relationship properties:")?;
        for (rel_type, props) in self.relationship_types.iter().filter(|(_, p)| !p.is_empty()) {
            write_properties(f, rel_type, props)?;
        }

        writeln!(f, "The relationships:")?;
        for pattern in &self.relationships {
            writeln!(
                f,
                "(:{})-[:{}]->(:{})",
                pattern.source, pattern.rel_type, pattern.target
            )?;
        }
        Ok(())
    }
}
