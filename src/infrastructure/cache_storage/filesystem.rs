#[cfg(test)]
#[path = "filesystem_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::Digest;
use sha2::Sha256;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::models::CacheRecord;
use crate::domain::models::CacheStorage;

/// A directory per namespace under `root`, a JSON file per record. File names
/// are the URL-safe base64 of the SHA-256 of the record key, so they stay a
/// fixed length however long the URL is. The key itself lives in the record.
pub struct FsCacheStorage {
    root: path::PathBuf,
}

impl FsCacheStorage {
    pub fn new(root: path::PathBuf) -> FsCacheStorage {
        return FsCacheStorage { root };
    }

    fn namespace_path(&self, namespace: &str) -> Result<path::PathBuf> {
        let valid = !namespace.is_empty()
            && namespace != "."
            && namespace != ".."
            && namespace.chars().all(|c| {
                return c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.';
            });

        if !valid {
            bail!(format!("Invalid cache name '{namespace}'"));
        }

        return Ok(self.root.join(namespace));
    }

    fn record_path(&self, namespace: &str, key: &str) -> Result<path::PathBuf> {
        let digest = Sha256::digest(key.as_bytes());
        let file_name = format!("{}.json", URL_SAFE_NO_PAD.encode(digest));
        return Ok(self.namespace_path(namespace)?.join(file_name));
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        let mut names: Vec<String> = vec![];
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        return Ok(names);
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        return Ok(self.namespace_path(namespace)?.is_dir());
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        fs::create_dir_all(self.namespace_path(namespace)?).await?;
        return Ok(());
    }

    async fn delete(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_path(namespace)?;
        if !dir.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(dir).await?;
        return Ok(true);
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheRecord>> {
        let file_path = self.record_path(namespace, key)?;
        if !file_path.exists() {
            return Ok(None);
        }

        let payload = fs::read_to_string(&file_path).await?;
        let record = serde_json::from_str::<CacheRecord>(&payload)
            .with_context(|| return format!("Corrupt cache record {}", file_path.display()))?;

        return Ok(Some(record));
    }

    async fn put(&self, namespace: &str, record: CacheRecord) -> Result<()> {
        self.open(namespace).await?;

        let file_path = self.record_path(namespace, &record.key)?;
        let mut file = fs::File::create(file_path).await?;
        file.write_all(serde_json::to_string(&record)?.as_bytes())
            .await?;
        file.flush().await?;

        return Ok(());
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<String>> {
        let dir_path = self.namespace_path(namespace)?;
        if !dir_path.exists() {
            return Ok(vec![]);
        }

        let mut keys: Vec<String> = vec![];
        let mut dir = fs::read_dir(&dir_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_path = entry.path();
            if file_path.extension().and_then(|ext| return ext.to_str()) != Some("json") {
                continue;
            }

            let payload = fs::read_to_string(&file_path).await?;
            match serde_json::from_str::<CacheRecord>(&payload) {
                Ok(record) => keys.push(record.key),
                Err(err) => {
                    tracing::warn!(error = ?err, file = %file_path.display(), "Skipping unreadable cache record");
                }
            }
        }
        keys.sort();

        return Ok(keys);
    }
}
