//! Prompt templates for the pipeline stages

use crate::graph::SchemaSnapshot;
use crate::llm::Message;

use super::types::{NO_INFORMATION, Question, ResultRecord};

const GENERATOR_SYSTEM: &str = "You translate questions about a healthcare knowledge graph \
into Neo4j Cypher. You answer with a single query and nothing else.";

const VALIDATOR_SYSTEM: &str = "You review Neo4j Cypher queries for syntax errors and for \
labels or relationship types that are missing from the schema.";

const SYNTHESIZER_SYSTEM: &str = "You are a healthcare assistant. You answer strictly from \
the database records you are given.";

/// Messages asking the model for a Cypher query
pub fn generation_messages(question: &Question, schema: &SchemaSnapshot, limit: usize) -> Vec<Message> {
    let prompt = format!(
        "Neo4j schema:\n{schema}\n\
         Write one Cypher query that answers: \"{question}\"\n\
         Rules:\n\
         - Use only these node labels: {labels}.\n\
         - Use only these relationship types: {relationships}.\n\
         - Compare name-like properties case-insensitively, for example \
         WHERE toLower(n.name) = toLower('value').\n\
         - Use MATCH and RETURN and end with LIMIT {limit}.\n\
         - Output the query only, with no markdown and no explanation.",
        schema = schema,
        question = question,
        labels = schema.label_summary(),
        relationships = schema.relationship_summary(),
        limit = limit,
    );

    vec![Message::system(GENERATOR_SYSTEM), Message::user(prompt)]
}

/// Messages asking the model for a one-line verdict
pub fn validation_messages(query: &str, schema: &SchemaSnapshot) -> Vec<Message> {
    let prompt = format!(
        "Neo4j schema:\n{schema}\n\
         Cypher query:\n{query}\n\n\
         Check the syntax and that every label and relationship type exists in the schema.\n\
         Reply with exactly one line: VALID, or INVALID: <reason>.",
        schema = schema,
        query = query,
    );

    vec![Message::system(VALIDATOR_SYSTEM), Message::user(prompt)]
}

/// Messages asking the model to answer from retrieved rows
pub fn synthesis_messages(question: &Question, records: &[ResultRecord]) -> Vec<Message> {
    let rows = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    let prompt = format!(
        "Question: \"{question}\"\n\
         Database records:\n{rows}\n\n\
         Answer concisely using only these records, shaped to the question \
         (a list for lists, a sentence for a single fact). Do not speculate. \
         If the records do not answer the question, reply exactly: {sentinel}",
        question = question,
        rows = rows,
        sentinel = NO_INFORMATION,
    );

    vec![Message::system(SYNTHESIZER_SYSTEM), Message::user(prompt)]
}
