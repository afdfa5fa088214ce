pub mod filesystem;
pub mod memory;

use std::path;
use std::sync::Arc;

use tokio::fs;

use crate::domain::models::CacheStorageBox;

pub struct CacheStorageManager {}

impl CacheStorageManager {
    /// Filesystem cache under `<data-dir>/cache`, or an in-memory cache when
    /// the directory cannot be created.
    pub async fn get(data_dir: &str) -> CacheStorageBox {
        let root = path::PathBuf::from(data_dir).join("cache");
        if let Err(err) = fs::create_dir_all(&root).await {
            tracing::warn!(
                error = ?err,
                data_dir,
                "Cache directory is unusable, falling back to an in-memory cache"
            );
            return Arc::new(memory::MemoryCacheStorage::default());
        }

        return Arc::new(filesystem::FsCacheStorage::new(root));
    }
}
