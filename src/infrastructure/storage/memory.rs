use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::models::Storage;

/// Process lifetime storage, used when the data directory is unusable.
#[derive(Default)]
pub struct MemoryStorage {
    values: DashMap<String, String>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        return Ok(self.values.get(key).map(|val| {
            return val.to_string();
        }));
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        return Ok(());
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        return Ok(());
    }
}
