//! Prompts for routing and general-knowledge answers

use crate::history::ConversationContext;
use crate::llm::Message;
use crate::pipeline::Question;

const HEALTHCARE_ASSISTANT: &str = "You are a healthcare assistant. Questions about specific \
patient data, diseases, doctors, hospitals, insurance providers, rooms or treatments are \
answered from the hospital database. General or educational questions are answered from \
common medical knowledge.";

const CONTINUITY: &str = "Refer to earlier parts of the conversation when relevant and keep \
the conversation consistent.";

/// System prompt with the thread's context appended
pub fn system_prompt(context: &ConversationContext) -> String {
    if context.is_empty() {
        HEALTHCARE_ASSISTANT.to_string()
    } else {
        format!("{}\n\n{}\n\n{}", HEALTHCARE_ASSISTANT, context.render(), CONTINUITY)
    }
}

/// Messages asking which route should answer
pub fn routing_messages(question: &Question, context: &ConversationContext) -> Vec<Message> {
    let prompt = format!(
        "Question: \"{}\"\n\n\
         Reply with one word: DATABASE if answering needs records from the hospital \
         database, GENERAL otherwise.",
        question
    );
    vec![Message::system(system_prompt(context)), Message::user(prompt)]
}

/// Messages asking for a general medical-knowledge answer
pub fn general_messages(question: &Question, context: &ConversationContext) -> Vec<Message> {
    let prompt = format!(
        "The user asked: '{}'. No specific data was found in the database. \
         Give a general answer based on common medical knowledge, then end with a short \
         follow-up question such as 'Do you have any more questions?'",
        question
    );
    vec![Message::system(system_prompt(context)), Message::user(prompt)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Turn;

    #[test]
    fn test_system_prompt_without_history() {
        let prompt = system_prompt(&ConversationContext::default());
        assert!(prompt.starts_with("You are a healthcare assistant."));
        assert!(!prompt.contains("## Previous conversation:"));
    }

    #[test]
    fn test_system_prompt_with_history() {
        let context = ConversationContext::from_turns(&[Turn::new("my name is Bao", "Hello Bao")]);
        let prompt = system_prompt(&context);
        assert!(prompt.contains("## Previous conversation:\nHuman: my name is Bao"));
        assert!(prompt.contains("- user's name: bao"));
        assert!(prompt.ends_with(CONTINUITY));
    }

    #[test]
    fn test_routing_prompt() {
        let question = Question::new("What is diabetes?").unwrap();
        let messages = routing_messages(&question, &ConversationContext::default());
        assert!(messages[1].content.contains("\"What is diabetes?\""));
        assert!(messages[1].content.contains("DATABASE"));
        assert!(messages[1].content.contains("GENERAL"));
    }
}
