#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

use std::path;

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::SessionCollection;
use crate::domain::models::SessionStorage;

/// Keeps the whole collection in one JSON file, the terminal counterpart of
/// the browser's `chatSessions` local storage key.
pub struct FileStorage {
    path: path::PathBuf,
}

impl Default for FileStorage {
    fn default() -> FileStorage {
        return FileStorage::new(path::PathBuf::from(Config::get(ConfigKey::SessionsFile)));
    }
}

impl FileStorage {
    pub fn new(path: path::PathBuf) -> FileStorage {
        return FileStorage { path };
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn read(&self) -> Result<SessionCollection> {
        if !self.path.exists() {
            return Ok(SessionCollection::new());
        }

        let payload = fs::read_to_string(&self.path).await?;
        if payload.trim().is_empty() {
            return Ok(SessionCollection::new());
        }

        let sessions: SessionCollection = serde_json::from_str(&payload)
            .with_context(|| return format!("Failed to parse {}", self.path.display()))?;

        return Ok(sessions);
    }

    async fn write(&self, sessions: &SessionCollection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let payload = serde_json::to_string(sessions)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;

        return Ok(());
    }

    fn location(&self) -> String {
        return self.path.to_string_lossy().to_string();
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;

#[cfg(test)]
mod memory {
    use std::sync::Arc;
    use std::sync::Mutex;

    use anyhow::bail;
    use anyhow::Result;
    use async_trait::async_trait;

    use crate::domain::models::SessionCollection;
    use crate::domain::models::SessionStorage;

    /// In memory storage that records every write. Clones share state.
    #[derive(Clone, Default)]
    pub struct MemoryStorage {
        saved: Arc<Mutex<SessionCollection>>,
        writes: Arc<Mutex<usize>>,
        failing: Arc<Mutex<bool>>,
    }

    impl MemoryStorage {
        pub fn with_sessions(sessions: SessionCollection) -> MemoryStorage {
            let storage = MemoryStorage::default();
            *storage.saved.lock().unwrap() = sessions;
            return storage;
        }

        pub fn saved(&self) -> SessionCollection {
            return self.saved.lock().unwrap().clone();
        }

        pub fn writes(&self) -> usize {
            return *self.writes.lock().unwrap();
        }

        /// Makes every following write fail until switched back.
        pub fn fail_writes(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }
    }

    #[async_trait]
    impl SessionStorage for MemoryStorage {
        async fn read(&self) -> Result<SessionCollection> {
            return Ok(self.saved());
        }

        async fn write(&self, sessions: &SessionCollection) -> Result<()> {
            if *self.failing.lock().unwrap() {
                bail!("disk full");
            }

            *self.saved.lock().unwrap() = sessions.clone();
            *self.writes.lock().unwrap() += 1;
            return Ok(());
        }

        fn location(&self) -> String {
            return "memory".to_string();
        }
    }
}
