use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::models::CacheRecord;
use crate::domain::models::CacheStorage;

#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: DashMap<String, BTreeMap<String, CacheRecord>>,
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        let mut names = self
            .namespaces
            .iter()
            .map(|entry| {
                return entry.key().to_string();
            })
            .collect::<Vec<String>>();
        names.sort();

        return Ok(names);
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        return Ok(self.namespaces.contains_key(namespace));
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        self.namespaces.entry(namespace.to_string()).or_default();
        return Ok(());
    }

    async fn delete(&self, namespace: &str) -> Result<bool> {
        return Ok(self.namespaces.remove(namespace).is_some());
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheRecord>> {
        let record = self.namespaces.get(namespace).and_then(|records| {
            return records.get(key).cloned();
        });

        return Ok(record);
    }

    async fn put(&self, namespace: &str, record: CacheRecord) -> Result<()> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(record.key.to_string(), record);

        return Ok(());
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<String>> {
        let keys = self
            .namespaces
            .get(namespace)
            .map(|records| {
                return records.keys().cloned().collect::<Vec<String>>();
            })
            .unwrap_or_default();

        return Ok(keys);
    }
}
