//! Cypher validation: a local structural check, then a model verdict

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::prompts::validation_messages;
use super::types::{CandidateQuery, ValidationVerdict};
use super::{QueryValidation, stage_error};
use crate::error::{Error, Result};
use crate::graph::SchemaSnapshot;
use crate::llm::{LanguageModel, SamplingParams};

/// Clause keywords; a query must contain at least one
const READ_CLAUSES: [&str; 5] = ["MATCH", "RETURN", "CALL", "WITH", "UNWIND"];

/// Clauses that modify the graph
const WRITE_CLAUSES: [&str; 8] = [
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH",
];

/// Options for the structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precheck {
    /// Reject queries containing write clauses
    pub read_only: bool,
}

/// Check a query's structure without a database or model
///
/// Rejects empty text, unbalanced brackets, unterminated strings or
/// comments, text with no Cypher clause, and (when `read_only`) write
/// clauses. Keywords inside string literals, backtick identifiers,
/// comments, property accesses and labels are ignored.
pub fn precheck(query: &str, read_only: bool) -> std::result::Result<(), String> {
    let query = query.trim();
    if query.is_empty() {
        return Err("empty query".to_string());
    }

    let words = scan(query)?;
    if !words.iter().any(|w| READ_CLAUSES.contains(&w.as_str())) {
        return Err("no Cypher clause found".to_string());
    }

    if read_only {
        if let Some(clause) = words.iter().find(|w| WRITE_CLAUSES.contains(&w.as_str())) {
            return Err(format!("write clause {} is not allowed", clause));
        }
        if words.windows(2).any(|pair| pair[0] == "LOAD" && pair[1] == "CSV") {
            return Err("write clause LOAD CSV is not allowed".to_string());
        }
    }

    Ok(())
}

/// Upper-cased keyword candidates, with bracket and quote checks on the way
fn scan(query: &str) -> std::result::Result<Vec<String>, String> {
    let mut stack: Vec<char> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut qualified = false;
    let mut previous: Option<char> = None;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() || c == '_' {
            if word.is_empty() {
                // n.set, :Create and $merge are names, not clauses
                qualified = matches!(previous, Some('.') | Some(':') | Some('$'));
            }
            word.push(c);
            previous = Some(c);
            continue;
        }

        if !word.is_empty() {
            if !qualified {
                words.push(word.to_uppercase());
            }
            word.clear();
        }

        match c {
            '\'' | '"' | '`' => {
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '\\' && c != '`' {
                        chars.next();
                    } else if inner == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(format!("unterminated {} literal", c));
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut closed = false;
                let mut star = false;
                for inner in chars.by_ref() {
                    if star && inner == '/' {
                        closed = true;
                        break;
                    }
                    star = inner == '*';
                }
                if !closed {
                    return Err("unterminated comment".to_string());
                }
            }
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(format!("unbalanced '{}'", c));
                }
            }
            _ => {}
        }

        if !c.is_whitespace() {
            previous = Some(c);
        }
    }

    if !word.is_empty() && !qualified {
        words.push(word.to_uppercase());
    }

    match stack.last() {
        Some(open) => Err(format!("unclosed '{}'", open)),
        None => Ok(words),
    }
}

/// Validator that asks a language model for a verdict
pub struct LlmQueryValidator {
    llm: Arc<dyn LanguageModel>,
    params: SamplingParams,
    precheck: Option<Precheck>,
}

impl LlmQueryValidator {
    pub fn new(llm: Arc<dyn LanguageModel>, params: SamplingParams) -> Self {
        Self {
            llm,
            params,
            precheck: None,
        }
    }

    /// Run the structural check before consulting the model
    pub fn with_precheck(mut self, precheck: Precheck) -> Self {
        self.precheck = Some(precheck);
        self
    }
}

#[async_trait]
impl QueryValidation for LlmQueryValidator {
    async fn validate(&self, query: CandidateQuery, schema: &SchemaSnapshot) -> Result<CandidateQuery> {
        if let Some(rules) = self.precheck {
            if let Err(reason) = precheck(query.as_str(), rules.read_only) {
                warn!(query = %query, reason = %reason, "Query failed structural check");
                return Err(Error::QueryValidation(format!(
                    "Invalid Cypher query: {}",
                    reason
                )));
            }
        }

        let messages = validation_messages(query.as_str(), schema);
        let reply = self
            .llm
            .complete(messages, &self.params)
            .await
            .map_err(|e| stage_error(e, Error::QueryValidation))?;

        let verdict = ValidationVerdict::from_reply(&reply, query);
        match &verdict {
            ValidationVerdict::Valid(query) => debug!(query = %query, "Query accepted"),
            ValidationVerdict::Invalid { reason } => warn!(reason = %reason, "Query rejected"),
        }
        verdict.into_result()
    }
}
