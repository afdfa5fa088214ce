pub mod file;
pub mod memory;

use std::path;
use std::sync::Arc;

use tokio::fs;

use crate::domain::models::StorageBox;

pub struct StorageManager {}

impl StorageManager {
    /// File backed storage under `data_dir`, or in-memory storage when the
    /// directory cannot be created.
    pub async fn get(data_dir: &str) -> StorageBox {
        let storage = file::FileStorage::new(path::PathBuf::from(data_dir));
        if let Err(err) = fs::create_dir_all(storage.root()).await {
            tracing::warn!(
                error = ?err,
                data_dir,
                "Data directory is unusable, settings and history will not survive a restart"
            );
            return Arc::new(memory::MemoryStorage::default());
        }

        return Arc::new(storage);
    }
}
