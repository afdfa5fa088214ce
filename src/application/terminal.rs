#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;

use std::io;
use std::io::Write;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::configuration::Config;
use crate::domain::models::Message;
use crate::domain::models::Sink;
use crate::domain::models::SlashCommand;
use crate::domain::models::StreamOutcome;
use crate::domain::services::AppState;
use crate::domain::services::ChatSession;
use crate::domain::services::CANCELLED;

pub const DISCOVERY_FAILED: &str =
    "Could not discover models from server. Ensure the server is reachable.";

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /models (/ml) - Lists the models available on the server.
- /model (/m) [MODEL_NAME] - Switches to MODEL_NAME and saves it as the active model.
- /new (/n) - Starts a new session, clearing the transcript and saved history.
- /quit /exit (/q) - Exit Neon.
- /help (/h) - Provides this help menu.

HOTKEYS:
- CTRL+C - Cancel the response in progress, otherwise exit.
    "#;

    return text.trim().to_string();
}

/// Plain text rendering of a transcript, one block per message.
pub fn render_transcript(messages: &[Message]) -> String {
    return messages
        .iter()
        .map(|message| {
            return format!("[{}]\n{}", message.role, message.content);
        })
        .collect::<Vec<String>>()
        .join("\n\n");
}

/// Prints each fragment as it lands. The session hands over the whole open
/// message, so only the part not yet printed is written.
pub struct TerminalSink<W: Write + Send> {
    out: Mutex<W>,
    printed: AtomicUsize,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> TerminalSink<io::Stdout> {
        return TerminalSink::new(io::stdout());
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> TerminalSink<W> {
        return TerminalSink {
            out: Mutex::new(out),
            printed: AtomicUsize::new(0),
        };
    }

    fn unprinted<'a>(&self, content: &'a str) -> &'a str {
        let printed = self.printed.swap(content.len(), Ordering::SeqCst);
        return content.get(printed..).unwrap_or_default();
    }

    fn write(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            if let Err(err) = write!(out, "{text}").and_then(|_| return out.flush()) {
                tracing::warn!(error = ?err, "Failed to write to terminal");
            }
        }
    }
}

impl<W: Write + Send> Sink for TerminalSink<W> {
    fn on_fragment_applied(&self, content: &str) {
        let text = self.unprinted(content);
        self.write(text);
    }

    fn on_cycle_finished(&self, content: &str, outcome: &StreamOutcome) {
        let markers = self.unprinted(content);
        if !markers.is_empty() {
            self.write(&Paint::red(markers).to_string());
        }

        if let StreamOutcome::Failed(reason) = outcome {
            if reason == CANCELLED {
                self.write(&Paint::yellow("\n[cancelled]").to_string());
            } else if !content.contains(reason.as_str()) {
                self.write(&Paint::red(format!("\n[incomplete] {reason}")).to_string());
            }
        }

        self.write("\n\n");
        self.printed.store(0, Ordering::SeqCst);
    }
}

fn print_prompt() {
    print!("{} ", Paint::cyan(">").bold());
    if let Err(err) = io::stdout().flush() {
        tracing::warn!(error = ?err, "Failed to flush prompt");
    }
}

async fn print_banner(state: &AppState) {
    let settings = state.current_settings().await;
    let transcript = state.snapshot().await;

    if !transcript.is_empty() {
        println!("{}\n", render_transcript(transcript.messages()));
        println!(
            "{}",
            Paint::new(format!("Restored {} messages.", transcript.len())).dimmed()
        );
    }

    println!(
        "{}",
        Paint::new(format!(
            "Neon {}. Chatting with {} on {}. Type /help for commands.",
            env!("CARGO_PKG_VERSION"),
            settings.model,
            settings.server_label()
        ))
        .dimmed()
    );
}

pub async fn print_models(session: &ChatSession, state: &AppState) {
    let models = match session.discover_models(state).await {
        Ok(models) => models,
        Err(err) => {
            tracing::error!(error = ?err, "Model discovery failed");
            println!("{}", Paint::yellow(DISCOVERY_FAILED));
            return;
        }
    };

    if models.is_empty() {
        println!("The server has no models installed.");
        return;
    }

    let current = state.current_settings().await.model;
    for (idx, model) in models.iter().enumerate() {
        match model_tag(idx, model, &current) {
            Some(ACTIVE_TAG) => {
                println!("- {} {}", Paint::green(model).bold(), Paint::new(ACTIVE_TAG).dimmed());
            }
            Some(tag) => println!("- {} {}", model, Paint::new(tag).dimmed()),
            None => println!("- {model}"),
        }
    }
}

const ACTIVE_TAG: &str = "(active)";
const SUGGESTED_TAG: &str = "(suggested)";

/// The active model is tagged as such. The first entry of the sorted listing
/// is the suggested model when it is not already active.
fn model_tag(idx: usize, model: &str, current: &str) -> Option<&'static str> {
    if model == current {
        return Some(ACTIVE_TAG);
    }

    if idx == 0 {
        return Some(SUGGESTED_TAG);
    }

    return None;
}

async fn run_command(session: &ChatSession, state: &AppState, cmd: &SlashCommand) {
    if cmd.is_help() {
        println!("{}\n", help_text());
        return;
    }

    if cmd.is_model_list() {
        print_models(session, state).await;
        return;
    }

    if cmd.is_model_set() {
        session
            .switch_model(state, &cmd.args[0], &Config::settings())
            .await;
        println!("Switched to model {}.", cmd.args[0]);
        return;
    }

    if cmd.is_new_session() {
        match session.new_session(state).await {
            Ok(_) => println!("Started a new session."),
            Err(err) => println!("{}", Paint::red(err)),
        }
    }
}

async fn send(session: &ChatSession, state: &AppState, text: &str) -> Result<()> {
    println!("{}", Paint::magenta("[assistant]").bold());

    let mut phase = state.subscribe();
    let cancel = CancellationToken::new();
    let cycle = session.send_with_cancel(state, text, cancel.clone());
    tokio::pin!(cycle);

    let outcome = loop {
        tokio::select! {
            outcome = &mut cycle => break outcome,
            Ok(_) = phase.changed() => {
                let current = *phase.borrow_and_update();
                tracing::debug!(phase = %current, "Cycle phase changed");
            }
            res = signal::ctrl_c(), if !cancel.is_cancelled() => {
                res?;
                cancel.cancel();
            }
        }
    };

    tracing::debug!(outcome = ?outcome, phase = %state.phase(), "Cycle ended");
    return Ok(());
}

/// Line oriented chat loop over stdin. Returns when stdin closes, on `/quit`,
/// or on CTRL+C at the prompt.
pub async fn start(session: &ChatSession, state: &AppState) -> Result<()> {
    print_banner(state).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            res = signal::ctrl_c() => {
                res?;
                None
            }
        };

        let text = match line {
            Some(text) => text,
            None => break,
        };

        if text.trim().is_empty() {
            continue;
        }

        if let Some(cmd) = SlashCommand::parse(&text) {
            if cmd.is_quit() {
                break;
            }

            run_command(session, state, &cmd).await;
            continue;
        }

        if text.trim_start().starts_with('/') {
            println!("{}", Paint::yellow("Unknown command, type /help to list commands."));
            continue;
        }

        send(session, state, &text).await?;
    }

    println!();
    return Ok(());
}
