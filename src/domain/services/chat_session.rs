#[cfg(test)]
#[path = "chat_session_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::AppState;
use super::CycleGuard;
use super::Persistence;
use super::StreamDecoder;
use crate::domain::models::BackendBox;
use crate::domain::models::ChatRequest;
use crate::domain::models::CyclePhase;
use crate::domain::models::Settings;
use crate::domain::models::Sink;
use crate::domain::models::StreamEvent;
use crate::domain::models::StreamOutcome;

pub const CANCELLED: &str = "cancelled";

pub fn network_marker(reason: &str) -> String {
    return format!("\n[network] {reason}");
}

pub fn error_marker(reason: &str) -> String {
    return format!("\n[error] {reason}");
}

/// Runs request/response cycles against the transcript held in `AppState`,
/// one at a time.
pub struct ChatSession {
    backend: BackendBox,
    persistence: Persistence,
    sink: Arc<dyn Sink>,
}

impl ChatSession {
    pub fn new(backend: BackendBox, persistence: Persistence, sink: Arc<dyn Sink>) -> ChatSession {
        return ChatSession {
            backend,
            persistence,
            sink,
        };
    }

    /// Sends `text` and streams the reply into the transcript. Returns `None`
    /// without touching anything when `text` is blank or another cycle is in
    /// flight.
    pub async fn send(&self, state: &AppState, text: &str) -> Option<StreamOutcome> {
        return self
            .send_with_cancel(state, text, CancellationToken::new())
            .await;
    }

    /// Same as `send`. Cancelling `cancel` stops reading the response and
    /// ends the cycle as `Failed("cancelled")`, keeping what already arrived.
    pub async fn send_with_cancel(
        &self,
        state: &AppState,
        text: &str,
        cancel: CancellationToken,
    ) -> Option<StreamOutcome> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        let guard = match state.try_lock() {
            Some(guard) => guard,
            None => {
                tracing::warn!("Ignoring send while a response is still streaming");
                return None;
            }
        };

        state.set_phase(CyclePhase::Sending);
        let settings = state.current_settings().await;

        let request = {
            let mut transcript = state.transcript.lock().await;
            if let Err(err) = transcript
                .push_user(content)
                .and_then(|_| return transcript.open_assistant())
            {
                tracing::error!(error = ?err, "Transcript refused a new cycle");
                return None;
            }

            ChatRequest::from_transcript(&settings.model, &transcript)
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Starting chat cycle"
        );

        let outcome = self
            .run_cycle(state, &settings.server_url, request, &cancel)
            .await;
        self.finish_cycle(state, guard, &outcome).await;

        return Some(outcome);
    }

    /// Clears the transcript and persists the empty history. Refused while a
    /// cycle is in flight.
    pub async fn new_session(&self, state: &AppState) -> Result<()> {
        let _guard = match state.try_lock() {
            Some(guard) => guard,
            None => {
                bail!("A response is still streaming, wait for it to finish before starting a new session")
            }
        };

        state.transcript.lock().await.clear()?;
        let settings = state.current_settings().await;
        self.persistence.save_history(&settings, &[]).await;

        return Ok(());
    }

    /// The explicit save action for settings.
    pub async fn save_settings(&self, state: &AppState, settings: Settings) {
        self.persistence.save_settings(&settings).await;
        *state.settings.write().await = settings;
    }

    /// Saves `model` on top of the persisted settings record and switches the
    /// running state to it. Run-only overrides held by `state` stay unsaved.
    pub async fn switch_model(&self, state: &AppState, model: &str, defaults: &Settings) {
        let mut persisted = self.persistence.load_settings(defaults).await;
        persisted.model = model.to_string();
        self.persistence.save_settings(&persisted).await;

        state.settings.write().await.model = model.to_string();
        tracing::info!(model, "Switched model");
    }

    pub async fn discover_models(&self, state: &AppState) -> Result<Vec<String>> {
        let settings = state.current_settings().await;
        return self.backend.list_models(&settings.server_url).await;
    }

    async fn run_cycle(
        &self,
        state: &AppState,
        server_url: &str,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return StreamOutcome::Failed(CANCELLED.to_string());
            }
            res = self.backend.chat(server_url, request) => res,
        };

        let mut stream = match res {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(error = ?err, "Chat request failed");
                self.annotate(state, &network_marker(&err.to_string()))
                    .await;
                return StreamOutcome::Failed(err.to_string());
            }
        };

        state.set_phase(CyclePhase::Streaming);
        let mut decoder = StreamDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Chat cycle cancelled");
                    return StreamOutcome::Failed(CANCELLED.to_string());
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in decoder.feed(&chunk) {
                        self.apply(state, event).await;
                    }
                }
                Some(Err(err)) => {
                    tracing::error!(error = ?err, "Chat response stream failed");
                    self.annotate(state, &network_marker(&err.to_string()))
                        .await;
                    return StreamOutcome::Failed(err.to_string());
                }
                None => break,
            }
        }

        let outcome = decoder.finish();
        tracing::debug!(
            outcome = ?outcome,
            dropped_lines = decoder.dropped_lines(),
            "Chat response finished"
        );

        return outcome;
    }

    async fn apply(&self, state: &AppState, event: StreamEvent) {
        match event {
            StreamEvent::Fragment(fragment) => {
                let content = state
                    .transcript
                    .lock()
                    .await
                    .append_open(&fragment.text)
                    .map(|content| {
                        return content.to_string();
                    });

                if let Some(content) = content {
                    self.sink.on_fragment_applied(&content);
                }
            }
            StreamEvent::UpstreamError(err) => {
                tracing::warn!(error = %err, "Server reported an error mid-stream");
                self.annotate(state, &error_marker(&err)).await;
            }
            StreamEvent::Done => {
                tracing::debug!("Completion marker received");
            }
        }
    }

    async fn annotate(&self, state: &AppState, marker: &str) {
        state.transcript.lock().await.append_open(marker);
    }

    async fn finish_cycle(&self, state: &AppState, guard: CycleGuard<'_>, outcome: &StreamOutcome) {
        let (messages, content) = {
            let mut transcript = state.transcript.lock().await;
            let content = transcript.open_content().unwrap_or_default().to_string();
            transcript.close();
            (transcript.messages().to_vec(), content)
        };

        let settings = state.current_settings().await;
        self.persistence.save_history(&settings, &messages).await;

        if outcome.is_completed() {
            state.set_phase(CyclePhase::Completed);
        } else {
            state.set_phase(CyclePhase::Failed);
        }
        state.set_phase(CyclePhase::Idle);
        drop(guard);

        self.sink.on_cycle_finished(&content, outcome);
    }
}
