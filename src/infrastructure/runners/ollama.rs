#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use std::future::Future;
use std::io;
use std::process::Output;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Prompt;
use crate::domain::models::Runner;
use crate::domain::models::RunnerError;

/// Extracts model names from `ollama list` output. The first line is a
/// column header, and every following non-empty line starts with the model
/// name. The column layout is not a stable interface, so only the first
/// token is relied on.
pub fn parse_model_list(stdout: &str) -> Vec<String> {
    return stdout
        .lines()
        .skip(1)
        .filter_map(|line| return line.split(char::is_whitespace).next())
        .filter(|name| return !name.is_empty())
        .map(|name| return name.to_string())
        .collect();
}

/// Drives the `ollama` CLI. Each call spawns a new process that is killed if
/// the call is dropped or times out before it exits.
pub struct Ollama {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Ollama {
    /// `command` may include leading arguments, for example
    /// `docker exec ollama ollama`. A zero timeout disables the bound.
    pub fn new(command: &str, timeout: Duration) -> Ollama {
        let mut parts = command
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        let program = if parts.is_empty() {
            "ollama".to_string()
        } else {
            parts.remove(0)
        };

        return Ollama {
            program,
            args: parts,
            timeout: if timeout.is_zero() {
                None
            } else {
                Some(timeout)
            },
        };
    }

    pub fn from_config() -> Result<Ollama> {
        let timeout_ms = Config::get(ConfigKey::RunnerTimeout)
            .parse::<u64>()
            .context("runner-timeout must be a number of milliseconds")?;

        return Ok(Ollama::new(
            &Config::get(ConfigKey::RunnerPath),
            Duration::from_millis(timeout_ms),
        ));
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        return cmd;
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, RunnerError>
    where
        F: Future<Output = Result<T, RunnerError>>,
    {
        let timeout = match self.timeout {
            Some(timeout) => timeout,
            None => return fut.await,
        };

        match tokio::time::timeout(timeout, fut).await {
            Ok(res) => return res,
            Err(_) => {
                return Err(RunnerError::Timeout {
                    program: self.program.to_string(),
                    timeout,
                })
            }
        }
    }

    fn io_err(&self, source: io::Error) -> RunnerError {
        return RunnerError::Io {
            program: self.program.to_string(),
            source,
        };
    }

    fn check_status(&self, output: &Output) -> Result<(), RunnerError> {
        if output.status.success() {
            return Ok(());
        }

        return Err(RunnerError::Exit {
            program: self.program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    async fn output(&self, args: &[&str]) -> Result<Output, RunnerError> {
        let child = self
            .command(args)
            .spawn()
            .map_err(|source| {
                return RunnerError::Spawn {
                    program: self.program.to_string(),
                    source,
                };
            })?;

        let output = self
            .bounded(async {
                return child
                    .wait_with_output()
                    .await
                    .map_err(|err| return self.io_err(err));
            })
            .await?;
        self.check_status(&output)?;

        return Ok(output);
    }
}

#[async_trait]
impl Runner for Ollama {
    async fn health_check(&self) -> Result<(), RunnerError> {
        let output = self.output(&["--version"]).await?;
        tracing::debug!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "Runner health check passed"
        );

        return Ok(());
    }

    async fn list_models(&self) -> Result<Vec<String>, RunnerError> {
        let output = self.output(&["list"]).await?;
        let models = parse_model_list(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(count = models.len(), "Listed models");

        return Ok(models);
    }

    async fn run(&self, model: &str, prompt: &Prompt) -> Result<String, RunnerError> {
        let mut child = self
            .command(&["run", model])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| {
                return RunnerError::Spawn {
                    program: self.program.to_string(),
                    source,
                };
            })?;
        tracing::debug!(pid = child.id(), model, "Spawned model runner");

        let mut stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                return Err(self.io_err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "stdin was not captured",
                )))
            }
        };

        let input = prompt.as_str().as_bytes();
        let write = async move {
            stdin.write_all(input).await?;
            stdin.shutdown().await?;
            return Ok::<(), io::Error>(());
        };

        // Stdin is fed while output is drained so large prompts can't fill
        // both pipes at once.
        let (write_res, output) = self
            .bounded(async {
                let (write_res, output_res) = tokio::join!(write, child.wait_with_output());
                let output = output_res.map_err(|err| return self.io_err(err))?;
                return Ok::<_, RunnerError>((write_res, output));
            })
            .await?;

        self.check_status(&output)?;
        if let Err(err) = write_res {
            tracing::warn!(err = ?err, model, "Runner exited before reading the whole prompt");
        }

        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }
}
