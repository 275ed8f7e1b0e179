//! Conversation context for prompts

use std::fmt::Write;

use super::Turn;

/// Transcript lines kept when rendering
const MAX_LINES: usize = 10;

const HEALTHCARE_KEYWORDS: [&str; 10] = [
    "patient",
    "doctor",
    "hospital",
    "disease",
    "treatment",
    "medication",
    "diagnosis",
    "symptoms",
    "insurance",
    "appointment",
];

/// Prior turns of a thread plus facts the user mentioned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    lines: Vec<String>,
    topics: Vec<String>,
}

impl ConversationContext {
    pub fn from_turns(turns: &[Turn]) -> Self {
        let mut context = Self::default();
        for turn in turns {
            context.lines.push(format!("Human: {}", turn.user_input));
            context.lines.push(format!("Assistant: {}", turn.response));
            for topic in extract_topics(&turn.user_input) {
                if !context.topics.contains(&topic) {
                    context.topics.push(topic);
                }
            }
        }
        context
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Markdown block for a system prompt; empty when there is no history
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.lines.is_empty() {
            out.push_str("## Previous conversation:\n");
            let start = self.lines.len().saturating_sub(MAX_LINES);
            if start > 0 {
                out.push_str("(Showing most recent conversation turns)\n");
            }
            out.push_str(&self.lines[start..].join("\n"));
        }

        if !self.topics.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("\n## Key information mentioned:");
            for topic in &self.topics {
                let _ = write!(out, "\n- {}", topic);
            }
        }

        out
    }
}

/// Healthcare keywords and personal details in a user message
pub fn extract_topics(message: &str) -> Vec<String> {
    let content = message.to_lowercase();
    let mut topics: Vec<String> = HEALTHCARE_KEYWORDS
        .iter()
        .filter(|keyword| content.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect();

    if let Some((_, rest)) = content.split_once("my name is") {
        if let Some(name) = rest.split_whitespace().next() {
            let name = name.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?'));
            if !name.is_empty() {
                topics.push(format!("user's name: {}", name));
            }
        }
    }

    if content.contains("year old") || content.contains("years old") {
        if let Some((_, rest)) = content.split_once("i am") {
            let before_year = rest.split("year").next().unwrap_or_default();
            let age: String = before_year.chars().filter(char::is_ascii_digit).collect();
            if !age.is_empty() {
                topics.push(format!("user's age: {}", age));
            }
        }
    }

    topics
}
