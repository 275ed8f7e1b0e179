//! Conversation history
//!
//! Turns are stored per thread in SQLite and replayed into prompts as a
//! `ConversationContext`.

mod database;
mod memory;
mod migrations;
mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use database::{Database, DatabaseConfig};
pub use memory::{ConversationContext, extract_topics};
pub use migrations::{CURRENT_VERSION, MigrationStatus};
pub use store::HistoryStore;

/// Title used before a thread has any messages
pub const UNTITLED: &str = "New conversation";

const TITLE_WORDS: usize = 4;
const TITLE_MAX_CHARS: usize = 30;

/// One question and its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user_input: String,
    pub response: String,
    /// Cypher query behind the response, if the graph was consulted
    pub query: Option<String>,
    /// `graph` or `general`
    pub route: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(user_input: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            response: response.into(),
            query: None,
            route: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}

/// A thread as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub thread_id: String,
    pub title: String,
    pub turn_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Short title from a thread's first user message
///
/// First four words; anything over 30 characters is cut to 27 plus `...`.
pub fn conversation_title(first_message: Option<&str>) -> String {
    let words: Vec<&str> = first_message
        .unwrap_or_default()
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect();

    if words.is_empty() {
        return UNTITLED.to_string();
    }

    let title = words.join(" ");
    if title.chars().count() > TITLE_MAX_CHARS {
        let cut: String = title.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_takes_first_four_words() {
        assert_eq!(
            conversation_title(Some("Which doctors treat patients with diabetes?")),
            "Which doctors treat patients"
        );
        assert_eq!(conversation_title(Some("Hello")), "Hello");
    }

    #[test]
    fn test_title_truncates_long_words() {
        let title = conversation_title(Some("Pneumonoultramicroscopicsilicovolcanoconiosis treatments"));
        assert_eq!(title.chars().count(), 30);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_title_without_messages() {
        assert_eq!(conversation_title(None), UNTITLED);
        assert_eq!(conversation_title(Some("   ")), UNTITLED);
    }

    #[test]
    fn test_turn_builder() {
        let turn = Turn::new("q", "a")
            .with_query(Some("MATCH (n) RETURN n".into()))
            .with_route("graph");
        assert_eq!(turn.query.as_deref(), Some("MATCH (n) RETURN n"));
        assert_eq!(turn.route.as_deref(), Some("graph"));
    }
}
