#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_derive::Serialize;

use super::Message;
use super::Transcript;

/// Response body of a chat request, delivered in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

impl ChatRequest {
    /// Streaming request carrying the whole transcript.
    pub fn from_transcript(model: &str, transcript: &Transcript) -> ChatRequest {
        return ChatRequest {
            model: model.to_string(),
            messages: transcript.messages().to_vec(),
            stream: true,
        };
    }
}

#[async_trait]
pub trait Backend {
    /// Lists the model names available on the server at `server_url`,
    /// sorted alphabetically.
    async fn list_models(&self, server_url: &str) -> Result<Vec<String>>;

    /// Issues a chat request and hands back the response body as a byte
    /// stream. Connection failures, non-success statuses, and a missing
    /// body are errors; everything after the first byte is the decoder's
    /// problem.
    async fn chat(&self, server_url: &str, request: ChatRequest) -> Result<ByteStream>;
}

pub type BackendBox = Arc<dyn Backend + Send + Sync>;
