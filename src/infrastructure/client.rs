#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatRequest;
use crate::domain::models::ChatResponse;
use crate::domain::models::Message;
use crate::domain::models::ModelListResponse;

/// Reply recorded in the transcript when the server can't be reached or
/// returns an error, so the conversation can carry on.
pub const FALLBACK_REPLY: &str = "Failed to get a response from the model.";

pub struct ChatClient {
    url: String,
}

impl Default for ChatClient {
    fn default() -> ChatClient {
        return ChatClient::new(&Config::get(ConfigKey::ServerURL));
    }
}

impl ChatClient {
    pub fn new(url: &str) -> ChatClient {
        return ChatClient {
            url: url.trim_end_matches('/').to_string(),
        };
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let res = reqwest::Client::new()
            .get(format!("{url}/api/llms", url = self.url))
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to list models from the server"
            );
            bail!("Failed to list models from the server");
        }

        let body = res.json::<ModelListResponse>().await?;
        return Ok(body.llms);
    }

    /// Sends the full history and returns the model's reply. Never fails; any
    /// error is logged and replaced by [`FALLBACK_REPLY`].
    pub async fn send(&self, llm: &str, messages: &[Message]) -> String {
        match self.try_send(llm, messages).await {
            Ok(reply) => return reply,
            Err(err) => {
                tracing::error!(err = ?err, llm, "Chat request failed");
                return FALLBACK_REPLY.to_string();
            }
        }
    }

    pub async fn try_send(&self, llm: &str, messages: &[Message]) -> Result<String> {
        let req = ChatRequest::new(llm, messages);
        let res = reqwest::Client::new()
            .post(format!("{url}/api/chat", url = self.url))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            bail!(format!(
                "Server responded to chat request with status {}",
                res.status().as_u16()
            ));
        }

        let body = res.json::<ChatResponse>().await?;
        return Ok(body.response);
    }
}
