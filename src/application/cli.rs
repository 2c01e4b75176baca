use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::help_text;
use crate::domain::services::SessionStore;
use crate::infrastructure::client::ChatClient;
use crate::infrastructure::storage::FileStorage;

/// What `main` should run once argument handling is done.
pub enum Mode {
    Serve,
    Chat,
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

async fn load_store() -> Result<SessionStore> {
    return SessionStore::load(Box::<FileStorage>::default()).await;
}

async fn print_sessions_list() -> Result<()> {
    let store = load_store().await?;
    let sessions = store
        .list()
        .iter()
        .rev()
        .map(|(id, session)| {
            return format!("- (ID: {id}) {}", session.summary());
        })
        .collect::<Vec<String>>();

    if sessions.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn import_session(file: &str) -> Result<()> {
    let payload = fs::read_to_string(file).await?;
    let mut store = load_store().await?;
    let id = store.import_session(&payload).await?;
    println!("Imported session {id}");

    return Ok(());
}

async fn export_session(id: &str, file: Option<&String>) -> Result<()> {
    let store = load_store().await?;
    let payload = store.export_session(id)?;

    if let Some(file) = file {
        fs::write(file, payload).await?;
        println!("Exported session {id} to {file}");
    } else {
        println!("{payload}");
    }

    return Ok(());
}

async fn print_models() -> Result<()> {
    let mut models = ChatClient::default().list_models().await?;
    models.sort();

    if models.is_empty() {
        println!("No models are installed on the server.");
    } else {
        println!("{}", models.join("\n"));
    }

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        )
        .subcommand(
            Command::new("keys").about("List all config keys as strings.").hide(true)
        );
}

fn subcommand_sessions_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all sessions.")
        .arg(
            clap::Arg::new("session-id")
                .short('i')
                .long("id")
                .help("Session ID")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all sessions.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args(["session-id", "all"])
                .required(true),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage chat sessions saved by the terminal client.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the sessions file path."))
        .subcommand(Command::new("list").about("List all sessions with their ids and models."))
        .subcommand(subcommand_sessions_delete())
        .subcommand(
            Command::new("import")
                .about("Import a session exported from the browser or the terminal. The session always gets a new ID.")
                .arg(
                    clap::Arg::new("file")
                        .short('f')
                        .long("file")
                        .help("Path to a JSON file containing {\"llm\": ..., \"messages\": [...]}")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("prompt")
                .about("Print the prompt the server would send to the model for a session.")
                .arg(
                    clap::Arg::new("session-id")
                        .short('i')
                        .long("id")
                        .help("Session ID")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export a session as JSON.")
                .arg(
                    clap::Arg::new("session-id")
                        .short('i')
                        .long("id")
                        .help("Session ID")
                        .required(true),
                )
                .arg(
                    clap::Arg::new("file")
                        .short('f')
                        .long("file")
                        .help("Write to this file instead of stdout."),
                ),
        );
}

fn arg_host() -> Arg {
    return Arg::new(ConfigKey::Host.to_string())
        .long(ConfigKey::Host.to_string())
        .env("LLMCHAT_HOST")
        .num_args(1)
        .help(format!(
            "Address the server binds to. [default: {}]",
            Config::default(ConfigKey::Host)
        ));
}

fn arg_port() -> Arg {
    return Arg::new(ConfigKey::Port.to_string())
        .short('p')
        .long(ConfigKey::Port.to_string())
        .env("PORT")
        .num_args(1)
        .help(format!(
            "Port the server listens on. [default: {}]",
            Config::default(ConfigKey::Port)
        ));
}

fn arg_runner_path() -> Arg {
    return Arg::new(ConfigKey::RunnerPath.to_string())
        .long(ConfigKey::RunnerPath.to_string())
        .env("LLMCHAT_RUNNER_PATH")
        .num_args(1)
        .help(format!(
            "Command used to run models. May include leading arguments, such as `docker exec ollama ollama`. [default: {}]",
            Config::default(ConfigKey::RunnerPath)
        ));
}

fn arg_runner_timeout() -> Arg {
    return Arg::new(ConfigKey::RunnerTimeout.to_string())
        .long(ConfigKey::RunnerTimeout.to_string())
        .env("LLMCHAT_RUNNER_TIMEOUT")
        .num_args(1)
        .help(format!(
            "Time in milliseconds a model may run for a single reply before it is killed. 0 waits forever. [default: {}]",
            Config::default(ConfigKey::RunnerTimeout)
        ));
}

fn arg_model() -> Arg {
    return Arg::new(ConfigKey::Model.to_string())
        .short('m')
        .long(ConfigKey::Model.to_string())
        .env("LLMCHAT_MODEL")
        .num_args(1)
        .help("The model to start a new session with. Defaults to the first model listed by the server if not set.");
}

fn arg_session_id() -> Arg {
    return Arg::new(ConfigKey::SessionID.to_string())
        .short('i')
        .long(ConfigKey::SessionID.to_string())
        .num_args(1)
        .help("Resume a saved session instead of starting a new one.");
}

fn subcommand_serve() -> Command {
    return Command::new("serve")
        .about("Start the chat server and web UI. This is the default command.")
        .arg(arg_host())
        .arg(arg_port())
        .arg(arg_runner_path())
        .arg(arg_runner_timeout());
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Chat from the terminal with a running server.")
        .arg(arg_model())
        .arg(arg_session_id());
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            return format!("CHAT {line}");
        })
        .collect::<Vec<String>>()
        .join("\n");

    return Command::new("llmchat")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_serve())
        .subcommand(subcommand_chat())
        .subcommand(Command::new("models").about("List models installed on the server."))
        .subcommand(subcommand_sessions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_completions())
        .arg(arg_host())
        .arg(arg_port())
        .arg(arg_runner_path())
        .arg(arg_runner_timeout())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("LLMCHAT_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::ServerURL.to_string())
                .long(ConfigKey::ServerURL.to_string())
                .env("LLMCHAT_SERVER_URL")
                .num_args(1)
                .help(format!("Server URL used by the terminal client. [default: {}]", Config::default(ConfigKey::ServerURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::SessionsFile.to_string())
                .long(ConfigKey::SessionsFile.to_string())
                .env("LLMCHAT_SESSIONS_FILE")
                .num_args(1)
                .help(format!("File the terminal client saves sessions to. [default: {}]", Config::default(ConfigKey::SessionsFile)))
                .global(true),
        );
}

async fn parse_sessions(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("dir", _)) => {
            println!("{}", load_store().await?.location());
        }
        Some(("list", _)) => {
            print_sessions_list().await?;
        }
        Some(("delete", delete_matches)) => {
            let mut store = load_store().await?;
            if let Some(session_id) = delete_matches.get_one::<String>("session-id") {
                if store.get(session_id).is_none() {
                    bail!(format!("No session found for id {session_id}"));
                }
                store.delete_session(session_id).await?;
                println!("Deleted session {session_id}");
            } else if delete_matches.get_flag("all") {
                store.clear().await?;
                println!("Deleted all sessions");
            } else {
                subcommand_sessions_delete().print_long_help()?;
            }
        }
        Some(("import", import_matches)) => {
            if let Some(file) = import_matches.get_one::<String>("file") {
                import_session(file).await?;
            }
        }
        Some(("prompt", prompt_matches)) => {
            if let Some(session_id) = prompt_matches.get_one::<String>("session-id") {
                let prompt = load_store().await?.render_prompt(session_id)?;
                println!("{}", prompt.as_str());
            }
        }
        Some(("export", export_matches)) => {
            if let Some(session_id) = export_matches.get_one::<String>("session-id") {
                export_session(session_id, export_matches.get_one::<String>("file")).await?;
            }
        }
        _ => {
            subcommand_sessions().print_long_help()?;
        }
    }

    return Ok(());
}

/// Handles one-shot commands and loads configuration. Returns the long
/// running mode to start, if any.
pub async fn parse() -> Result<Option<Mode>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("serve", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            return Ok(Some(Mode::Serve));
        }
        Some(("chat", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            return Ok(Some(Mode::Chat));
        }
        Some(("models", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            print_models().await?;
        }
        Some(("sessions", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            parse_sessions(subcmd_matches).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            Some(("keys", _)) => {
                println!("{}", ConfigKey::VARIANTS.join("\n"));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        _ => {
            Config::load(vec![&matches]).await?;
            return Ok(Some(Mode::Serve));
        }
    }

    return Ok(None);
}
