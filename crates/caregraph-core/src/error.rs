//! Error types for CareGraph

use thiserror::Error;

/// Result type alias using CareGraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// CareGraph error types with helpful messages and suggestions
///
/// The four pipeline stage variants render only their cause, so the
/// orchestrator can surface them verbatim as `Error: <cause>`.
#[derive(Error, Debug)]
pub enum Error {
    // Pipeline stage errors (E001-E099)
    #[error("{0}")]
    QueryGeneration(String),

    #[error("{0}")]
    QueryValidation(String),

    #[error("{0}")]
    QueryExecution(String),

    #[error("{0}")]
    ResponseSynthesis(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Retry after {0} seconds.")]
    RateLimited(u64),

    // Graph database errors (E200-E299)
    #[error("Graph database error: {0}")]
    GraphDatabase(String),

    // History store errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueryGeneration(_) => "E001",
            Self::QueryValidation(_) => "E002",
            Self::QueryExecution(_) => "E003",
            Self::ResponseSynthesis(_) => "E004",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::GraphDatabase(_) => "E200",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => {
                Some("Check the CAREGRAPH_API_KEY or GITHUB_TOKEN environment variable".to_string())
            }
            Self::RateLimited(secs) => Some(format!("Wait {} seconds and ask again", secs)),
            Self::GraphDatabase(_) => {
                Some("Check NEO4J_URI, NEO4J_USERNAME and NEO4J_PASSWORD".to_string())
            }
            Self::ConfigError(_) => Some("caregraph config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error was raised by one of the four pipeline stages
    pub fn is_stage_error(&self) -> bool {
        matches!(
            self,
            Self::QueryGeneration(_)
                | Self::QueryValidation(_)
                | Self::QueryExecution(_)
                | Self::ResponseSynthesis(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_render_cause_only() {
        assert_eq!(Error::QueryGeneration("rate limited".into()).to_string(), "rate limited");
        assert_eq!(Error::QueryExecution("syntax error".into()).to_string(), "syntax error");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::QueryValidation("x".into()).code(), "E002");
        assert_eq!(Error::ConfigError("x".into()).code(), "E600");
        assert_eq!(Error::Other("x".into()).code(), "E9999");
    }

    #[test]
    fn test_suggestions() {
        assert!(Error::GraphDatabase("down".into()).suggestion().is_some());
        assert_eq!(
            Error::RateLimited(30).suggestion().as_deref(),
            Some("Wait 30 seconds and ask again")
        );
        assert!(Error::QueryGeneration("x".into()).suggestion().is_none());
    }

    #[test]
    fn test_is_stage_error() {
        assert!(Error::ResponseSynthesis("x".into()).is_stage_error());
        assert!(!Error::InvalidInput("x".into()).is_stage_error());
    }
}
