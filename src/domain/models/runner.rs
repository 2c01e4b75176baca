use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::Prompt;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with status {code:?}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("failed to communicate with {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[async_trait]
pub trait Runner {
    /// Used at startup to verify the runner binary can be executed.
    async fn health_check(&self) -> Result<(), RunnerError>;

    /// Lists the names of every locally installed model.
    async fn list_models(&self) -> Result<Vec<String>, RunnerError>;

    /// Runs a single completion. The runner process is started for this call
    /// only, receives the prompt on stdin, and its full stdout is returned
    /// once it exits.
    async fn run(&self, model: &str, prompt: &Prompt) -> Result<String, RunnerError>;
}

pub type RunnerRef = Arc<dyn Runner + Send + Sync>;
