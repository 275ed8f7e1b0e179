//! Values flowing through the GraphRAG pipeline

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::graph::GraphRecord;

/// Fixed answer for questions the database has no rows for
pub const NO_INFORMATION: &str = "No information found from the database.";

/// A natural-language question; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cypher text produced by the generator, not yet known to be well-formed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery(String);

impl CandidateQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The validator's judgement of a candidate query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Valid(CandidateQuery),
    Invalid { reason: String },
}

impl ValidationVerdict {
    /// Interpret a model reply; anything not starting with `VALID` rejects
    pub fn from_reply(reply: &str, query: CandidateQuery) -> Self {
        let reply = reply.trim();
        if reply.starts_with("VALID") {
            Self::Valid(query)
        } else if reply.is_empty() {
            Self::Invalid {
                reason: "empty verdict".to_string(),
            }
        } else {
            Self::Invalid {
                reason: reply.to_string(),
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Accepted query, or a validation error carrying the reason
    pub fn into_result(self) -> Result<CandidateQuery> {
        match self {
            Self::Valid(query) => Ok(query),
            Self::Invalid { reason } => Err(Error::QueryValidation(format!(
                "Invalid Cypher query: {}",
                reason
            ))),
        }
    }
}

/// One normalized result row, columns in query order
///
/// Values are plain JSON; temporal values are ISO-8601 strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRecord {
    fields: Vec<(String, Value)>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Normalize a raw database row
    pub fn from_graph(record: &GraphRecord) -> Self {
        Self {
            fields: record
                .iter()
                .map(|(k, v)| (k.to_string(), v.normalize()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ResultRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Terminal artifact of one pipeline run
///
/// `query` is `None` exactly when a stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub query: Option<String>,
    pub response: String,
}

impl PipelineOutcome {
    pub fn success(query: CandidateQuery, response: impl Into<String>) -> Self {
        Self {
            query: Some(query.into_string()),
            response: response.into(),
        }
    }

    pub fn failure(error: &Error) -> Self {
        Self {
            query: None,
            response: format!("Error: {}", error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.query.is_none() && self.response.starts_with("Error:")
    }

    /// Whether the database returned no rows for the question
    pub fn is_empty_result(&self) -> bool {
        self.response == NO_INFORMATION
    }
}

/// Pipeline state; each run moves forward one step at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    Generated,
    Validated,
    Executed,
    Done,
    Failed,
}

impl PipelineStage {
    /// State after the pending step succeeds
    pub fn advance(self) -> Self {
        match self {
            Self::Start => Self::Generated,
            Self::Generated => Self::Validated,
            Self::Validated => Self::Executed,
            Self::Executed => Self::Done,
            Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// Name of the step that runs when leaving this state
    pub fn pending_step(self) -> Option<&'static str> {
        match self {
            Self::Start => Some("generate"),
            Self::Generated => Some("validate"),
            Self::Validated => Some("execute"),
            Self::Executed => Some("synthesize"),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Generated => "generated",
            Self::Validated => "validated",
            Self::Executed => "executed",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphValue;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_question_rejects_blank() {
        assert!(matches!(Question::new("   "), Err(Error::InvalidInput(_))));
        assert_eq!(Question::new("  Who treats Anna?\n").unwrap().as_str(), "Who treats Anna?");
    }

    #[test]
    fn test_verdict_from_reply() {
        let query = CandidateQuery::new("MATCH (p:Patient) RETURN p LIMIT 5");
        assert!(ValidationVerdict::from_reply("VALID", query.clone()).is_valid());
        assert!(ValidationVerdict::from_reply("  VALID\n", query.clone()).is_valid());

        let verdict = ValidationVerdict::from_reply("INVALID: Missing MATCH", query.clone());
        assert_eq!(
            verdict,
            ValidationVerdict::Invalid {
                reason: "INVALID: Missing MATCH".to_string()
            }
        );
        let err = verdict.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Invalid Cypher query: INVALID: Missing MATCH");

        assert!(!ValidationVerdict::from_reply("The query looks VALID", query.clone()).is_valid());
        assert!(!ValidationVerdict::from_reply("", query).is_valid());
    }

    #[test]
    fn test_result_record_from_graph_normalizes_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let raw = GraphRecord::new()
            .with("name", "John Doe")
            .with("date_of_admission", date)
            .with("age", 54i64);
        let record = ResultRecord::from_graph(&raw);
        assert_eq!(record.get("date_of_admission"), Some(&json!("2024-02-01")));
        assert_eq!(record.get("age"), Some(&json!(54)));
        assert_eq!(
            record.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["name", "date_of_admission", "age"]
        );
        assert!(!matches!(raw.get("date_of_admission"), Some(GraphValue::String(_))));
    }

    #[test]
    fn test_result_record_serializes_in_column_order() {
        let record = ResultRecord::new().with("zeta", 1).with("alpha", "a");
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"zeta":1,"alpha":"a"}"#);
    }

    #[test]
    fn test_outcome_helpers() {
        let failed = PipelineOutcome::failure(&Error::QueryGeneration("rate limited".into()));
        assert_eq!(failed.response, "Error: rate limited");
        assert!(failed.is_error());

        let ok = PipelineOutcome::success(CandidateQuery::new("RETURN 1"), NO_INFORMATION);
        assert!(!ok.is_error());
        assert!(ok.is_empty_result());
    }

    #[test]
    fn test_stage_transitions() {
        let mut stage = PipelineStage::Start;
        let mut steps = Vec::new();
        while let Some(step) = stage.pending_step() {
            steps.push(step);
            stage = stage.advance();
        }
        assert_eq!(steps, vec!["generate", "validate", "execute", "synthesize"]);
        assert_eq!(stage, PipelineStage::Done);
        assert!(stage.is_terminal());
        assert_eq!(PipelineStage::Failed.advance(), PipelineStage::Failed);
    }
}
