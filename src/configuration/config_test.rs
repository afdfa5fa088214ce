use anyhow::Result;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use super::split_list;
use super::Config;
use super::ConfigKey;
use crate::application::cli;

// Config is process wide, tests that load it take turns.
static LOAD_LOCK: Lazy<Mutex<()>> = Lazy::new(|| return Mutex::new(()));

#[test]
fn it_serializes_to_valid_toml() {
    let res = Config::serialize_default(cli::build());
    let toml_res = res.parse::<toml_edit::Document>();
    assert!(toml_res.is_ok());

    assert!(res.contains("server-url = \"http://localhost:11434\""));
    assert!(res.contains("save-history = true"));
    assert!(res.contains("[possible values: true, false]"));
    assert!(!res.contains("config-file"));
}

#[test]
fn it_splits_the_asset_manifest() {
    assert_eq!(
        split_list(" ./, ./index.html ,,./app.js"),
        vec![
            "./".to_string(),
            "./index.html".to_string(),
            "./app.js".to_string()
        ]
    );
}

#[tokio::test]
async fn it_loads_config_from_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches =
        cli::build().try_get_matches_from(vec!["neon", "-c", "./config.example.toml"])?;
    Config::load(cli::build(), vec![&matches]).await?;

    assert_eq!(Config::get(ConfigKey::ServerURL), "http://localhost:11434");
    assert_eq!(Config::get(ConfigKey::Model), "llama3.1");
    assert_eq!(Config::get(ConfigKey::SaveHistory), "true");
    return Ok(());
}

#[tokio::test]
async fn it_layers_flags_over_file_over_defaults() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "server-url = \"http://from-file:11434\"\nmodel = \"from-file\"\nsave-history = false\n",
    )?;
    let config_path = config_path.to_string_lossy().to_string();

    let matches = cli::build().try_get_matches_from(vec![
        "neon",
        "-c",
        config_path.as_str(),
        "--model",
        "other",
    ])?;
    Config::load(cli::build(), vec![&matches]).await?;

    assert_eq!(Config::get(ConfigKey::Model), "other");
    assert_eq!(Config::get(ConfigKey::ServerURL), "http://from-file:11434");
    assert_eq!(Config::get(ConfigKey::SaveHistory), "false");
    assert_eq!(
        Config::get(ConfigKey::AssetVersion),
        Config::default(ConfigKey::AssetVersion)
    );
    assert!(!Config::settings().save_history);
    return Ok(());
}

#[tokio::test]
async fn it_fails_to_loads_config_from_file() -> Result<()> {
    let _lock = LOAD_LOCK.lock().await;
    let matches =
        cli::build().try_get_matches_from(vec!["neon", "-c", "./test/bad-config.toml"])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());
    return Ok(());
}
