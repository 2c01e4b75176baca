#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::Message;
use crate::domain::models::Prompt;
use crate::domain::models::Role;
use crate::domain::models::Session;
use crate::domain::models::SessionCollection;
use crate::domain::models::SessionStorageBox;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid file: the content is not valid JSON ({0})")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid file: the \"llm\" field is missing or empty")]
    MissingModel,

    #[error("Invalid file: the \"messages\" field must be an array")]
    MessagesNotArray,

    #[error("Invalid file: a message is malformed ({0})")]
    InvalidMessage(#[source] serde_json::Error),
}

/// Parses and validates a single exported session document.
pub fn parse_session_document(payload: &str) -> Result<Session, ImportError> {
    let doc: Value = serde_json::from_str(payload).map_err(ImportError::InvalidJson)?;

    let llm = match doc.get("llm").and_then(|val| return val.as_str()) {
        Some(llm) if !llm.trim().is_empty() => llm.to_string(),
        _ => return Err(ImportError::MissingModel),
    };

    let messages = match doc.get("messages") {
        Some(messages @ Value::Array(_)) => messages.clone(),
        _ => return Err(ImportError::MessagesNotArray),
    };
    let messages: Vec<Message> =
        serde_json::from_value(messages).map_err(ImportError::InvalidMessage)?;

    return Ok(Session { llm, messages });
}

/// Client side session collection. Every mutation rewrites the whole
/// collection to storage before returning.
pub struct SessionStore {
    storage: SessionStorageBox,
    sessions: SessionCollection,
    active: Option<String>,
}

impl SessionStore {
    pub async fn load(storage: SessionStorageBox) -> Result<SessionStore> {
        let sessions = storage.read().await?;
        tracing::debug!(
            count = sessions.len(),
            location = %storage.location(),
            "Loaded sessions"
        );

        return Ok(SessionStore {
            storage,
            sessions,
            active: None,
        });
    }

    pub fn create_id() -> String {
        let suffix = Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap_or_default()
            .to_string();

        return format!("session-{}-{suffix}", Utc::now().timestamp_millis());
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = SessionStore::create_id();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Writes `sessions` to storage and only then replaces the in-memory
    /// collection, so a failed write leaves the store as it was.
    async fn commit(&mut self, sessions: SessionCollection) -> Result<()> {
        self.storage.write(&sessions).await?;
        self.sessions = sessions;

        return Ok(());
    }

    pub fn location(&self) -> String {
        return self.storage.location();
    }

    pub fn list(&self) -> &SessionCollection {
        return &self.sessions;
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        return self.sessions.get(id);
    }

    pub fn active_id(&self) -> Option<&str> {
        return self.active.as_deref();
    }

    pub fn active(&self) -> Option<&Session> {
        return self
            .active
            .as_ref()
            .and_then(|id| return self.sessions.get(id));
    }

    pub fn select_session(&mut self, id: &str) -> Result<()> {
        if !self.sessions.contains_key(id) {
            bail!(format!("No session found for id {id}"));
        }

        self.active = Some(id.to_string());
        return Ok(());
    }

    pub async fn create_session(&mut self, llm: &str) -> Result<String> {
        let id = self.fresh_id();
        let mut sessions = self.sessions.clone();
        sessions.insert(id.to_string(), Session::new(llm));
        self.commit(sessions).await?;
        self.active = Some(id.to_string());

        tracing::debug!(id = %id, llm, "Created session");
        return Ok(id);
    }

    pub async fn append_message(&mut self, id: &str, role: Role, content: &str) -> Result<()> {
        let mut sessions = self.sessions.clone();
        match sessions.get_mut(id) {
            Some(session) => session.messages.push(Message::new(role, content)),
            None => bail!(format!("No session found for id {id}")),
        };
        self.commit(sessions).await?;

        return Ok(());
    }

    pub async fn delete_session(&mut self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.clone();
        sessions.remove(id);
        self.commit(sessions).await?;
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }

        tracing::debug!(id, "Deleted session");
        return Ok(());
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.commit(SessionCollection::new()).await?;
        self.active = None;

        return Ok(());
    }

    /// Adds an exported session under a new id, even when identical content is
    /// already stored. Invalid documents leave the collection untouched.
    pub async fn import_session(&mut self, payload: &str) -> Result<String> {
        let session = parse_session_document(payload)?;

        let id = self.fresh_id();
        let mut sessions = self.sessions.clone();
        sessions.insert(id.to_string(), session);
        self.commit(sessions).await?;
        self.active = Some(id.to_string());

        tracing::debug!(id = %id, "Imported session");
        return Ok(id);
    }

    pub fn export_session(&self, id: &str) -> Result<String> {
        let session = match self.sessions.get(id) {
            Some(session) => session,
            None => bail!(format!("No session found for id {id}")),
        };

        return Ok(serde_json::to_string_pretty(session)?);
    }

    pub fn render_prompt(&self, id: &str) -> Result<Prompt> {
        let session = match self.sessions.get(id) {
            Some(session) => session,
            None => bail!(format!("No session found for id {id}")),
        };

        return Ok(session.prompt());
    }
}
