#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Message;

/// Body of `POST /api/chat`. Missing fields deserialize to empty values so
/// validation can tell them apart from malformed JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub llm: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(llm: &str, messages: &[Message]) -> ChatRequest {
        return ChatRequest {
            llm: llm.to_string(),
            messages: messages.to_vec(),
        };
    }

    /// The model name is passed to the runner as an argument, so it must not
    /// look like a flag.
    pub fn is_valid(&self) -> bool {
        let llm = self.llm.trim();
        return !llm.is_empty() && !llm.starts_with('-') && !self.messages.is_empty();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub llms: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
