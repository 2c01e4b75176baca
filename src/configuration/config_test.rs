use anyhow::Result;
use tempfile::TempDir;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

#[test]
fn it_serializes_to_valid_toml() -> Result<()> {
    let res = Config::serialize_default(cli::build());
    let doc = res.parse::<toml_edit::Document>()?;

    assert_eq!(doc["port"].as_integer(), Some(3000));
    assert_eq!(doc["runner-path"].as_str(), Some("ollama"));
    assert_eq!(doc["runner-timeout"].as_integer(), Some(0));
    assert_eq!(doc["server-url"].as_str(), Some("http://localhost:3000"));
    assert!(doc.get("session-id").is_none());
    assert!(res.contains("# Port the server listens on."));

    return Ok(());
}

#[test]
fn it_names_keys_in_kebab_case() {
    assert_eq!(ConfigKey::RunnerPath.to_string(), "runner-path");
    assert_eq!(ConfigKey::ServerURL.to_string(), "server-url");
    assert_eq!(ConfigKey::SessionID.to_string(), "session-id");
    assert_eq!(ConfigKey::SessionsFile.to_string(), "sessions-file");
}

// Config is process wide, so every load scenario runs in one test.
#[tokio::test]
async fn it_layers_defaults_file_and_args() -> Result<()> {
    let dir = TempDir::new()?;
    let config_path = dir.path().join("config.toml");
    tokio::fs::write(
        &config_path,
        "runner-path = \"/opt/ollama/bin/ollama\"\nrunner-timeout = 60000\nhost = \"\"\n",
    )
    .await?;
    let config_path_str = config_path.to_string_lossy().to_string();

    let matches = cli::build().try_get_matches_from(vec!["llmchat", "-c", config_path_str.as_str()])?;
    Config::load(vec![&matches]).await?;
    assert_eq!(Config::get(ConfigKey::RunnerPath), "/opt/ollama/bin/ollama");
    assert_eq!(Config::get(ConfigKey::RunnerTimeout), "60000");
    assert_eq!(Config::get(ConfigKey::Host), "127.0.0.1");

    let matches = cli::build().try_get_matches_from(vec![
        "llmchat",
        "-c",
        config_path_str.as_str(),
        "--runner-path",
        "docker exec ollama ollama",
    ])?;
    Config::load(vec![&matches]).await?;
    assert_eq!(Config::get(ConfigKey::RunnerPath), "docker exec ollama ollama");
    assert_eq!(Config::get(ConfigKey::RunnerTimeout), "60000");

    let bad_path = dir.path().join("bad.toml");
    tokio::fs::write(&bad_path, "runner-timeout = \"soon\"\n").await?;
    let bad_path_str = bad_path.to_string_lossy().to_string();
    let matches = cli::build().try_get_matches_from(vec!["llmchat", "-c", bad_path_str.as_str()])?;
    assert!(Config::load(vec![&matches]).await.is_err());

    tokio::fs::write(&bad_path, "runner-timeout = [1, 2]\n").await?;
    assert!(Config::load(vec![&matches]).await.is_err());

    let missing_path = dir
        .path()
        .join("missing.toml")
        .to_string_lossy()
        .to_string();
    let matches = cli::build().try_get_matches_from(vec!["llmchat", "-c", missing_path.as_str()])?;
    Config::load(vec![&matches]).await?;
    assert_eq!(Config::get(ConfigKey::RunnerPath), "ollama");

    return Ok(());
}
