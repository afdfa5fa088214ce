#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::domain::models::CacheRequest;
use crate::domain::models::CacheResponse;
use crate::domain::models::Fetcher;

/// Header values are kept as received. Bytes outside ASCII are decoded as
/// UTF-8, lossily.
fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    return headers
        .iter()
        .map(|(name, value)| {
            return (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            );
        })
        .collect();
}

/// Network side of the offline cache, backed by reqwest.
#[derive(Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[allow(clippy::implicit_return)]
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())?;
        let res = self
            .client
            .request(method, request.url.clone())
            .send()
            .await?;

        let status = res.status().as_u16();
        let headers = header_pairs(res.headers());
        let body = res.bytes().await?.to_vec();

        tracing::debug!(url = %request.url, status, "Fetched asset");

        return Ok(CacheResponse {
            status,
            headers,
            body,
        });
    }
}
