#[cfg(test)]
#[path = "prompt_test.rs"]
mod tests;

use super::Message;
use super::Role;

/// The flattened text handed to a model runner on stdin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    text: String,
}

impl Prompt {
    /// Renders every message as `<Label>: <content>`, one per line, and ends
    /// with an open assistant turn so the model continues the conversation.
    pub fn from_messages(messages: &[Message]) -> Prompt {
        let history = messages
            .iter()
            .map(|msg| return msg.as_prompt_line())
            .collect::<Vec<String>>()
            .join("\n");

        return Prompt {
            text: format!("{history}\n{}: ", Role::Assistant.label()),
        };
    }

    pub fn as_str(&self) -> &str {
        return &self.text;
    }
}
