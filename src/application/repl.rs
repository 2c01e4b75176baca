#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::greeting;
use crate::domain::models::help_text;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::SlashCommand;
use crate::domain::services::SessionStore;
use crate::infrastructure::client::ChatClient;
use crate::infrastructure::storage::FileStorage;

fn format_message(llm: &str, msg: &Message) -> String {
    match msg.role {
        Role::User => return format!("You: {}", msg.content),
        Role::Assistant => return format!("{llm}: {}", msg.content),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(format!("{text}\n").as_bytes()).await?;
    output.flush().await?;
    return Ok(());
}

/// Line based chat over the session store. Input is read a line at a time;
/// every non-command line is one user turn.
pub struct Repl {
    store: SessionStore,
    client: ChatClient,
}

impl Repl {
    pub fn new(store: SessionStore, client: ChatClient) -> Repl {
        return Repl { store, client };
    }

    #[cfg(test)]
    pub fn store(&self) -> &SessionStore {
        return &self.store;
    }

    /// Resumes `session_id` when given, otherwise starts a session for
    /// `model`, falling back to the first model the server lists.
    pub async fn open(&mut self, model: &str, session_id: &str) -> Result<String> {
        if !session_id.is_empty() {
            self.store.select_session(session_id)?;
            return Ok(session_id.to_string());
        }

        let mut llm = model.to_string();
        if llm.is_empty() {
            let models = self.client.list_models().await?;
            llm = match models.first() {
                Some(first) => first.to_string(),
                None => bail!("The server has no models installed"),
            };
        }

        let id = self.store.create_session(&llm).await?;
        self.store
            .append_message(&id, Role::Assistant, &greeting(&llm))
            .await?;

        return Ok(id);
    }

    /// Records the user's text, asks the server for a reply with the whole
    /// history and records that too. Blank input is ignored.
    pub async fn submit(&mut self, id: &str, text: &str) -> Result<Option<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.store.append_message(id, Role::User, text).await?;

        let (llm, messages) = match self.store.get(id) {
            Some(session) => (session.llm.to_string(), session.messages.clone()),
            None => bail!(format!("No session found for id {id}")),
        };
        let reply = self.client.send(&llm, &messages).await;
        self.store
            .append_message(id, Role::Assistant, &reply)
            .await?;

        return Ok(Some(reply));
    }

    async fn export<W: AsyncWrite + Unpin>(
        &self,
        id: &str,
        args: &[String],
        output: &mut W,
    ) -> Result<()> {
        let payload = self.store.export_session(id)?;
        match args.first() {
            Some(path) => {
                fs::write(path, payload).await?;
                write_line(output, &format!("Saved session to {path}")).await?;
            }
            None => write_line(output, &payload).await?,
        }

        return Ok(());
    }

    async fn model_list<W: AsyncWrite + Unpin>(&self, output: &mut W) -> Result<()> {
        let mut models = self.client.list_models().await?;
        models.sort();

        let res = models
            .iter()
            .enumerate()
            .map(|(idx, model)| {
                let n = idx + 1;
                return format!("- ({n}) {model}");
            })
            .collect::<Vec<String>>();

        write_line(output, &res.join("\n")).await?;
        return Ok(());
    }

    async fn command<W: AsyncWrite + Unpin>(
        &self,
        id: &str,
        cmd: &SlashCommand,
        output: &mut W,
    ) -> Result<()> {
        if cmd.is_model_list() {
            return self.model_list(output).await;
        }
        if cmd.is_export() {
            return self.export(id, &cmd.args, output).await;
        }

        return write_line(output, &help_text()).await;
    }

    /// Chats in the active session until input ends or `/quit` is entered.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (id, session) = match (self.store.active_id(), self.store.active()) {
            (Some(id), Some(session)) => (id.to_string(), session.clone()),
            _ => bail!("No session is open"),
        };
        for msg in session.messages.iter() {
            write_line(output, &format_message(&session.llm, msg)).await?;
        }
        let llm = session.llm;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(cmd) = SlashCommand::parse(&line) {
                if cmd.is_quit() {
                    break;
                }
                if let Err(err) = self.command(&id, &cmd, output).await {
                    tracing::error!(err = ?err, "Slash command failed");
                    write_line(output, &format!("Error: {err}")).await?;
                }
                continue;
            }

            if let Some(reply) = self.submit(&id, &line).await? {
                write_line(output, &format_message(&llm, &Message::assistant(&reply))).await?;
            }
        }

        return Ok(());
    }
}

pub async fn start() -> Result<()> {
    let store = SessionStore::load(Box::<FileStorage>::default()).await?;
    let mut repl = Repl::new(store, ChatClient::default());

    let id = repl
        .open(
            &Config::get(ConfigKey::Model),
            &Config::get(ConfigKey::SessionID),
        )
        .await?;
    tracing::info!(id = %id, "Chat session opened");
    println!("Session {id}. Type /help for commands.\n");

    let mut stdout = tokio::io::stdout();
    repl.run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await?;

    return Ok(());
}
