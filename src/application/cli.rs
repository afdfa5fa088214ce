#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::parser::ValueSource;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use super::terminal;
use super::terminal::TerminalSink;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AssetManifest;
use crate::domain::models::CacheRequest;
use crate::domain::models::NoopSink;
use crate::domain::models::Settings;
use crate::domain::models::Sink;
use crate::domain::services::AppState;
use crate::domain::services::CacheManager;
use crate::domain::services::ChatSession;
use crate::domain::services::Persistence;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::cache_storage::CacheStorageManager;
use crate::infrastructure::fetchers::http::HttpFetcher;
use crate::infrastructure::storage::StorageManager;

const SETTINGS_KEYS: [ConfigKey; 3] = [
    ConfigKey::ServerURL,
    ConfigKey::Model,
    ConfigKey::SaveHistory,
];

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

/// Settings keys passed explicitly on the command line.
fn explicit_keys(matches: &[&ArgMatches], include_env: bool) -> Vec<ConfigKey> {
    return SETTINGS_KEYS
        .iter()
        .filter(|key| {
            return matches.iter().any(|m| {
                return match m.value_source(&key.to_string()) {
                    Some(ValueSource::CommandLine) => true,
                    Some(ValueSource::EnvVariable) => include_env,
                    _ => false,
                };
            });
        })
        .copied()
        .collect();
}

/// Copies the fields named by `keys` from `config` into `settings`.
fn apply_keys(mut settings: Settings, config: &Settings, keys: &[ConfigKey]) -> Settings {
    for key in keys {
        match key {
            ConfigKey::ServerURL => settings.server_url = config.server_url.to_string(),
            ConfigKey::Model => settings.model = config.model.to_string(),
            ConfigKey::SaveHistory => settings.save_history = config.save_history,
            _ => {}
        }
    }

    return settings;
}

/// Builds the chat runtime from config and whatever was persisted. Explicit
/// flags win over persisted settings for this run only.
async fn load_session(sink: Arc<dyn Sink>, overrides: &[ConfigKey]) -> (ChatSession, AppState) {
    let storage = StorageManager::get(&Config::get(ConfigKey::DataDir)).await;
    let persistence = Persistence::new(storage);

    let defaults = Config::settings();
    let settings = apply_keys(persistence.load_settings(&defaults).await, &defaults, overrides);

    let transcript = persistence.load_history(&settings).await;
    let state = AppState::new(settings, transcript);
    let session = ChatSession::new(BackendManager::get(), persistence, sink);

    return (session, state);
}

async fn load_cache() -> Result<CacheManager> {
    let manifest = AssetManifest::new(
        &Config::get(ConfigKey::AssetOrigin),
        &Config::get(ConfigKey::AssetEntry),
        &Config::asset_manifest(),
    )?;
    let storage = CacheStorageManager::get(&Config::get(ConfigKey::DataDir)).await;

    return Ok(CacheManager::new(
        &Config::get(ConfigKey::AssetVersion),
        manifest,
        storage,
        Arc::new(HttpFetcher::default()),
    ));
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

async fn print_settings(state: &AppState) {
    let settings = state.current_settings().await;
    println!("server-url = {}", settings.server_url);
    println!("model = {}", settings.model);
    println!("save-history = {}", settings.save_history);
}

async fn run_settings(matches: &[&ArgMatches], subcmd_matches: &ArgMatches) -> Result<()> {
    let (session, state) = load_session(Arc::new(NoopSink {}), &[]).await;

    match subcmd_matches.subcommand() {
        Some(("set", set_matches)) => {
            let mut all_matches = matches.to_vec();
            all_matches.push(set_matches);
            let keys = explicit_keys(&all_matches, false);
            if keys.is_empty() {
                subcommand_settings_set().print_long_help()?;
                return Ok(());
            }

            let settings = apply_keys(state.current_settings().await, &Config::settings(), &keys);
            session.save_settings(&state, settings).await;
            print_settings(&state).await;
        }
        _ => {
            print_settings(&state).await;
        }
    }

    return Ok(());
}

async fn run_history(subcmd_matches: &ArgMatches) -> Result<()> {
    let (session, state) = load_session(Arc::new(NoopSink {}), &[]).await;

    match subcmd_matches.subcommand() {
        Some(("clear", _)) => {
            session.new_session(&state).await?;
            println!("Cleared chat history");
        }
        _ => {
            let transcript = state.snapshot().await;
            if transcript.is_empty() {
                println!("There is no chat history.");
            } else {
                println!("{}", terminal::render_transcript(transcript.messages()));
            }
        }
    }

    return Ok(());
}

async fn run_cache(subcmd_matches: &ArgMatches) -> Result<()> {
    let cache = load_cache().await?;

    match subcmd_matches.subcommand() {
        Some(("install", _)) => {
            cache.install().await?;
            println!(
                "Installed {} assets into {}",
                cache.manifest().assets.len(),
                cache.version()
            );
        }
        Some(("activate", _)) => {
            let deleted = cache.activate().await?;
            if deleted.is_empty() {
                println!("Activated {}", cache.version());
            } else {
                println!(
                    "Activated {}, removed {}",
                    cache.version(),
                    deleted.join(", ")
                );
            }
        }
        Some(("fetch", fetch_matches)) => {
            let url = match fetch_matches.get_one::<String>("url") {
                Some(url) => cache.manifest().base.join(url)?,
                None => {
                    subcommand_cache().print_long_help()?;
                    return Ok(());
                }
            };

            let res = cache.handle_fetch(CacheRequest::get(url.clone())).await;
            cache.settle().await;

            let response = res?;
            println!("{} {} ({} bytes)", response.status, url, response.body.len());
            for (name, value) in response.headers {
                println!("{name}: {value}");
            }
        }
        _ => {
            println!("version = {}", cache.version());
            println!("installed = {}", cache.is_installed().await?);
            for asset in &cache.manifest().assets {
                println!("- {asset}");
            }
        }
    }

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
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for Neon")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running Neon with environment variable RUST_LOG=neon")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn subcommand_settings_set() -> Command {
    return Command::new("set")
        .about("Saves the connection settings passed with --server-url, --model, and --save-history.");
}

fn subcommand_settings() -> Command {
    return Command::new("settings")
        .about("Show or change the saved connection settings.")
        .subcommand(Command::new("show").about("Print the active settings."))
        .subcommand(subcommand_settings_set());
}

fn subcommand_history() -> Command {
    return Command::new("history")
        .about("Manage the saved chat transcript.")
        .subcommand(Command::new("show").about("Print the saved transcript."))
        .subcommand(Command::new("clear").about("Clear the transcript and its saved copy."));
}

fn subcommand_cache() -> Command {
    return Command::new("cache")
        .about("Manage the offline cache of the client's static assets.")
        .arg_required_else_help(true)
        .subcommand(Command::new("install").about("Fetch every manifest asset into the current cache version."))
        .subcommand(Command::new("activate").about("Remove every cache version other than the current one."))
        .subcommand(
            Command::new("fetch")
                .about("Fetch a URL through the cache, the way the offline client does.")
                .arg(
                    Arg::new("url")
                        .short('u')
                        .long("url")
                        .help("Absolute URL, or a path relative to the asset origin.")
                        .num_args(1)
                        .required(true),
                ),
        )
        .subcommand(Command::new("status").about("Show the current cache version and its manifest."));
}

fn arg_bool(key: ConfigKey, env: &'static str, help: &str) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(format!("{help} [default: {}]", Config::default(key)))
        .value_parser(PossibleValuesParser::new(["true", "false"]))
        .global(true);
}

fn arg_string(key: ConfigKey, env: &'static str, help: &str) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(format!("{help} [default: {}]", Config::default(key)))
        .global(true);
}

pub fn build() -> Command {
    let commands_text = terminal::help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") || line.starts_with("HOTKEYS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("neon")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(Command::new("chat").about("Start an interactive chat session."))
        .subcommand(Command::new("models").about("List the models available on the server."))
        .subcommand(subcommand_settings())
        .subcommand(subcommand_history())
        .subcommand(subcommand_cache())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("NEON_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(arg_string(ConfigKey::ServerURL, "NEON_SERVER_URL", "Base URL of the Ollama compatible server."))
        .arg(
            arg_string(ConfigKey::Model, "NEON_MODEL", "Model identifier sent with every chat request.")
                .short('m')
        )
        .arg(arg_bool(ConfigKey::SaveHistory, "NEON_SAVE_HISTORY", "Persist the transcript between runs."))
        .arg(arg_string(ConfigKey::DataDir, "NEON_DATA_DIR", "Directory holding saved settings, history, and the asset cache."))
        .arg(arg_string(ConfigKey::AssetOrigin, "NEON_ASSET_ORIGIN", "Origin the client's static assets are served from."))
        .arg(arg_string(ConfigKey::AssetVersion, "NEON_ASSET_VERSION", "Cache version the assets are installed under. Bump it on every deploy."))
        .arg(arg_string(ConfigKey::AssetEntry, "NEON_ASSET_ENTRY", "Entry point served when offline and nothing better is cached."))
        .arg(arg_string(ConfigKey::AssetManifest, "NEON_ASSET_MANIFEST", "Comma separated asset paths precached on install, relative to the asset origin."));
}

/// Handles one-shot commands. Returns the settings overrides to start the
/// interactive chat with, or `None` when the command already ran.
pub async fn parse() -> Result<Option<Vec<ConfigKey>>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    let log_path = dirs::cache_dir()
                        .unwrap_or_else(|| return path::PathBuf::from("."))
                        .join("neon/debug.log");
                    println!("{}", log_path.to_string_lossy());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(None);
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(None);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(None);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(None);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(None);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(None);
            }
        },
        Some(("models", subcmd_matches)) => {
            let all_matches = vec![&matches, subcmd_matches];
            Config::load(build(), all_matches.clone()).await?;
            let (session, state) =
                load_session(Arc::new(NoopSink {}), &explicit_keys(&all_matches, true)).await;
            terminal::print_models(&session, &state).await;
            return Ok(None);
        }
        Some(("settings", subcmd_matches)) => {
            let all_matches = vec![&matches, subcmd_matches];
            Config::load(build(), all_matches.clone()).await?;
            run_settings(&all_matches, subcmd_matches).await?;
            return Ok(None);
        }
        Some(("history", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_history(subcmd_matches).await?;
            return Ok(None);
        }
        Some(("cache", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_cache(subcmd_matches).await?;
            return Ok(None);
        }
        Some(("chat", subcmd_matches)) => {
            let all_matches = vec![&matches, subcmd_matches];
            Config::load(build(), all_matches.clone()).await?;
            return Ok(Some(explicit_keys(&all_matches, true)));
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
            return Ok(Some(explicit_keys(&[&matches], true)));
        }
    }
}

/// Runs the interactive chat with the config loaded by `parse`. `overrides`
/// are the settings keys that beat persisted settings for this run.
pub async fn chat(overrides: &[ConfigKey]) -> Result<()> {
    let (session, state) = load_session(Arc::new(TerminalSink::stdout()), overrides).await;
    return terminal::start(&session, &state).await;
}
