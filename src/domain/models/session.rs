#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Message;
use super::Prompt;

/// Every session keyed by its id. Ids start with a millisecond timestamp, so
/// ordering follows creation order.
pub type SessionCollection = BTreeMap<String, Session>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub llm: String,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(llm: &str) -> Session {
        return Session {
            llm: llm.to_string(),
            messages: vec![],
        };
    }

    pub fn prompt(&self) -> Prompt {
        return Prompt::from_messages(&self.messages);
    }

    /// One-line description shown in session listings.
    pub fn summary(&self) -> String {
        let count = self.messages.len();
        let noun = if count == 1 { "message" } else { "messages" };
        return format!("{} - {count} {noun}", self.llm);
    }
}

/// Introduction posted by the assistant when a session starts from a model
/// selection.
pub fn greeting(llm: &str) -> String {
    return format!(
        "Hello! I am the model \"{llm}\". I'm ready to help you. Ask me a question or tell me how I can help."
    );
}
