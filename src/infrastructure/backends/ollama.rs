#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::models::Backend;
use crate::domain::models::ByteStream;
use crate::domain::models::ChatRequest;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Model {
    name: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ModelListResponse {
    pub models: Vec<Model>,
}

fn endpoint(server_url: &str, path: &str) -> String {
    return format!("{}/{path}", server_url.trim_end_matches('/'));
}

#[derive(Default)]
pub struct Ollama {
    client: reqwest::Client,
}

#[async_trait]
impl Backend for Ollama {
    #[allow(clippy::implicit_return)]
    async fn list_models(&self, server_url: &str) -> Result<Vec<String>> {
        let res = self
            .client
            .get(endpoint(server_url, "api/tags"))
            .send()
            .await
            .context("Could not reach the server")?;

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Failed to list models");
            bail!(format!("Request failed: {}", res.status().as_u16()));
        }

        let body = res.json::<ModelListResponse>().await?;
        let mut models: Vec<String> = body
            .models
            .iter()
            .map(|model| {
                return model.name.to_string();
            })
            .collect();

        models.sort();

        return Ok(models);
    }

    #[allow(clippy::implicit_return)]
    async fn chat(&self, server_url: &str, request: ChatRequest) -> Result<ByteStream> {
        let res = self
            .client
            .post(endpoint(server_url, "api/chat"))
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make chat request to Ollama"
            );
            bail!(format!("Request failed: {}", res.status().as_u16()));
        }

        let stream = res.bytes_stream().map_err(|err| {
            return anyhow::Error::new(err).context("Response stream interrupted");
        });

        return Ok(Box::pin(stream));
    }
}
