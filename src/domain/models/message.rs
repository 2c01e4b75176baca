#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when a conversation is flattened into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => return "Usuário",
            Role::Assistant => return "Assistente",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message {
            role,
            content: content.to_string(),
        };
    }

    #[cfg(test)]
    pub fn user(content: &str) -> Message {
        return Message::new(Role::User, content);
    }

    pub fn assistant(content: &str) -> Message {
        return Message::new(Role::Assistant, content);
    }

    pub fn as_prompt_line(&self) -> String {
        return format!("{}: {}", self.role.label(), self.content);
    }
}
