use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Storage {
    /// Returns the stored text for `key`, or `None` when nothing is stored.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a key that does not exist succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

pub type StorageBox = Arc<dyn Storage + Send + Sync>;
