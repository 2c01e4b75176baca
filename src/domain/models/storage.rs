use anyhow::Result;
use async_trait::async_trait;

use super::SessionCollection;

/// Where a session collection lives between runs. Writes always replace the
/// whole collection.
#[async_trait]
pub trait SessionStorage {
    async fn read(&self) -> Result<SessionCollection>;

    async fn write(&self, sessions: &SessionCollection) -> Result<()>;

    /// Human readable location, printed by `sessions dir`.
    fn location(&self) -> String;
}

pub type SessionStorageBox = Box<dyn SessionStorage + Send + Sync>;
