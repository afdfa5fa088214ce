#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use chrono::SecondsFormat;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.serialize_str(&STANDARD.encode(body));
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        return STANDARD.decode(encoded).map_err(serde::de::Error::custom);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheRequest {
    pub method: String,
    pub url: Url,
}

impl CacheRequest {
    pub fn get(url: Url) -> CacheRequest {
        return CacheRequest {
            method: "GET".to_string(),
            url,
        };
    }

    /// Request identity used as the key inside a namespace.
    pub fn cache_key(&self) -> String {
        return format!("{} {}", self.method.to_uppercase(), self.url);
    }

    pub fn is_get(&self) -> bool {
        return self.method.eq_ignore_ascii_case("GET");
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl CacheResponse {
    pub fn is_success(&self) -> bool {
        return (200..300).contains(&self.status);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub response: CacheResponse,
    pub stored_at: String,
}

impl CacheRecord {
    pub fn new(request: &CacheRequest, response: CacheResponse) -> CacheRecord {
        return CacheRecord {
            key: request.cache_key(),
            response,
            stored_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        };
    }
}

/// Named, versioned collections of stored responses.
#[async_trait]
pub trait CacheStorage {
    /// Names of every namespace that currently exists.
    async fn keys(&self) -> Result<Vec<String>>;

    async fn has(&self, namespace: &str) -> Result<bool>;

    /// Creates the namespace if it is absent.
    async fn open(&self, namespace: &str) -> Result<()>;

    /// Destroys a namespace and everything in it. Returns whether it existed.
    async fn delete(&self, namespace: &str) -> Result<bool>;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheRecord>>;

    /// Stores a record, creating the namespace if needed and replacing any
    /// record under the same key.
    async fn put(&self, namespace: &str, record: CacheRecord) -> Result<()>;

    /// Keys of every record in a namespace, sorted.
    async fn entries(&self, namespace: &str) -> Result<Vec<String>>;
}

pub type CacheStorageBox = Arc<dyn CacheStorage + Send + Sync>;

/// Network side of the cache. Only transport failures are errors, any HTTP
/// status is a response.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse>;
}

pub type FetcherBox = Arc<dyn Fetcher + Send + Sync>;

/// The client's own static assets, resolved against its origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetManifest {
    pub base: Url,
    pub entry_point: Url,
    pub assets: Vec<Url>,
}

impl AssetManifest {
    /// Resolves relative asset paths such as `./index.html` against `base`.
    /// The entry point is added to the asset list when missing.
    pub fn new(base: &str, entry_point: &str, assets: &[String]) -> Result<AssetManifest> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let entry_point = base.join(entry_point)?;
        let mut resolved: Vec<Url> = vec![];
        for asset in assets {
            let trimmed = asset.trim();
            if trimmed.is_empty() {
                continue;
            }

            let url = base.join(trimmed)?;
            if !resolved.contains(&url) {
                resolved.push(url);
            }
        }

        if !resolved.contains(&entry_point) {
            resolved.push(entry_point.clone());
        }

        return Ok(AssetManifest {
            base,
            entry_point,
            assets: resolved,
        });
    }

    /// Whether `url` shares scheme, host, and port with the client.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        return url.origin() == self.base.origin();
    }
}
