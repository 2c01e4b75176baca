#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ConfigFile,
    Host,
    Model,
    Port,
    RunnerPath,
    RunnerTimeout,
    ServerURL,
    SessionID,
    SessionsFile,
}

fn app_dir() -> path::PathBuf {
    return dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("llmchat");
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return Config::default(key);
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn log_path() -> path::PathBuf {
        return app_dir().join("debug.log");
    }

    pub fn default(key: ConfigKey) -> String {
        #[cfg(not(target_os = "macos"))]
        let config_path = app_dir().join("config.toml");
        #[cfg(target_os = "macos")]
        let config_path = dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".config/llmchat/config.toml");

        let sessions_path = app_dir().join("chatSessions.json");

        let res = match key {
            ConfigKey::Host => "127.0.0.1",
            ConfigKey::Model => "",
            ConfigKey::Port => "3000",
            ConfigKey::RunnerPath => "ollama",
            ConfigKey::RunnerTimeout => "0",
            ConfigKey::ServerURL => "http://localhost:3000",

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
            ConfigKey::SessionID => "",
            ConfigKey::SessionsFile => return sessions_path.to_string_lossy().to_string(),
        };

        return res.to_string();
    }

    pub async fn load(clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if let Some(val) = doc.get(&key.to_string()) {
                    if let Some(val_int) = val.as_integer() {
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        Config::set(key, val_str);
                    } else {
                        bail!(format!(
                            "config.toml has an invalid value for key '{key}': {}",
                            val.to_string().trim()
                        ));
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        Config::validate()?;

        tracing::debug!(
            host = Config::get(ConfigKey::Host),
            port = Config::get(ConfigKey::Port),
            runner_path = Config::get(ConfigKey::RunnerPath),
            runner_timeout = Config::get(ConfigKey::RunnerTimeout),
            server_url = Config::get(ConfigKey::ServerURL),
            sessions_file = Config::get(ConfigKey::SessionsFile),
            "config"
        );

        return Ok(());
    }

    fn validate() -> Result<()> {
        let port = Config::get(ConfigKey::Port);
        if port.parse::<u16>().is_err() {
            bail!(format!("port must be a number between 0 and 65535, got '{port}'"));
        }

        let timeout = Config::get(ConfigKey::RunnerTimeout);
        if timeout.parse::<u64>().is_err() {
            bail!(format!(
                "runner-timeout must be a number of milliseconds, got '{timeout}'"
            ));
        }

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::SessionID
                    || key == ConfigKey::ConfigFile
                    || key == ConfigKey::Model
                {
                    return None;
                }

                let mut description = cmd
                    .get_subcommands()
                    .flat_map(|subcmd| return subcmd.get_arguments())
                    .chain(cmd.get_arguments())
                    .find(|arg| return arg.get_long() == Some(key.to_string().as_str()))
                    .and_then(|arg| return arg.get_help())
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i64>().is_ok() {
                    val = format!("{key} = {val}");
                } else if val.contains('\\') {
                    val = format!("{key} = '{val}'");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
