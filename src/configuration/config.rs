#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

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

use crate::domain::models::Settings;
use crate::domain::models::DEFAULT_MODEL;
use crate::domain::models::DEFAULT_SERVER_URL;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    AssetEntry,
    AssetManifest,
    AssetOrigin,
    AssetVersion,
    ConfigFile,
    DataDir,
    Model,
    SaveHistory,
    ServerURL,
}

fn user_dir(dir: Option<path::PathBuf>) -> path::PathBuf {
    return dir.unwrap_or_else(|| return path::PathBuf::from(".")).join("neon");
}

fn split_list(raw: &str) -> Vec<String> {
    return raw
        .split(',')
        .map(|asset| {
            return asset.trim().to_string();
        })
        .filter(|asset| {
            return !asset.is_empty();
        })
        .collect();
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = user_dir(dirs::config_dir()).join("config.toml");
        let data_dir = user_dir(dirs::data_dir());

        let res = match key {
            ConfigKey::AssetEntry => "./index.html",
            ConfigKey::AssetManifest => {
                "./,./index.html,./styles.css,./app.js,./manifest.webmanifest,./icons/icon.svg"
            }
            ConfigKey::AssetOrigin => "http://localhost:8080/",
            ConfigKey::AssetVersion => "neon-terminal-v1",
            ConfigKey::Model => DEFAULT_MODEL,
            ConfigKey::SaveHistory => "true",
            ConfigKey::ServerURL => DEFAULT_SERVER_URL,

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
            ConfigKey::DataDir => return data_dir.to_string_lossy().to_string(),
        };

        return res.to_string();
    }

    /// Defaults that persisted settings are overlaid on.
    pub fn settings() -> Settings {
        return Settings {
            server_url: Config::get(ConfigKey::ServerURL),
            model: Config::get(ConfigKey::Model),
            save_history: Config::get(ConfigKey::SaveHistory) != "false",
        }
        .sanitize(&Settings::default());
    }

    /// Relative asset paths listed in the `asset-manifest` key.
    pub fn asset_manifest() -> Vec<String> {
        return split_list(&Config::get(ConfigKey::AssetManifest));
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
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
                    // Use clap value parsers to do validation.
                    let mut possible_values = vec![];
                    if let Some(arg) = cmd.get_arguments().find(|e| {
                        return e.get_long().unwrap_or_default() == key.to_string();
                    }) {
                        possible_values = arg
                            .get_possible_values()
                            .iter()
                            .map(|e| return e.get_name().to_string())
                            .collect::<Vec<String>>();
                    }

                    let val_str = if let Some(val_bool) = val.as_bool() {
                        val_bool.to_string()
                    } else if let Some(val_int) = val.as_integer() {
                        val_int.to_string()
                    } else if let Some(val_str) = val.as_str() {
                        val_str.to_string()
                    } else {
                        bail!(format!("config.toml has an unsupported value for key '{key}'"));
                    };

                    if val_str.is_empty() {
                        continue;
                    }
                    if !possible_values.is_empty() && !possible_values.contains(&val_str) {
                        bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
                    }
                    Config::set(key, &val_str);
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

        tracing::debug!(
            data_dir = %Config::get(ConfigKey::DataDir),
            server_url = %Config::get(ConfigKey::ServerURL),
            model = %Config::get(ConfigKey::Model),
            save_history = %Config::get(ConfigKey::SaveHistory),
            asset_origin = %Config::get(ConfigKey::AssetOrigin),
            asset_version = %Config::get(ConfigKey::AssetVersion),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd.get_arguments().find(|e| {
                    return e.get_long().unwrap_or_default() == key.to_string();
                })?;

                let mut description = arg.get_help()?.to_string();
                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name())
                        .collect::<Vec<_>>()
                        .join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if key == ConfigKey::DataDir {
                    val = format!("# {key} = \"{val}\"");
                } else if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val == "true" || val == "false" || val.parse::<i32>().is_ok() {
                    val = format!("{key} = {val}");
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
