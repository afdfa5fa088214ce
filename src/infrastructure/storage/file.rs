#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::models::Storage;

/// Bumped whenever the on-disk record layout changes.
pub const STORAGE_VERSION: &str = "v1";

/// One JSON file per key under `<data-dir>/v1/`. A key such as
/// `neon/history` lands in `<data-dir>/v1/neon/history.json`.
pub struct FileStorage {
    root: path::PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: path::PathBuf) -> FileStorage {
        return FileStorage {
            root: data_dir.join(STORAGE_VERSION),
        };
    }

    pub fn root(&self) -> &path::Path {
        return &self.root;
    }

    fn get_file_path(&self, key: &str) -> Result<path::PathBuf> {
        let valid = !key.is_empty()
            && key.split('/').all(|segment| {
                return !segment.is_empty()
                    && segment != "."
                    && segment != ".."
                    && segment.chars().all(|c| {
                        return c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.';
                    });
            });

        if !valid {
            bail!(format!("Invalid storage key '{key}'"));
        }

        return Ok(self.root.join(format!("{key}.json")));
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let file_path = self.get_file_path(key)?;
        if !file_path.exists() {
            return Ok(None);
        }

        let payload = fs::read_to_string(file_path).await?;
        return Ok(Some(payload));
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let file_path = self.get_file_path(key)?;
        if let Some(parent) = file_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(file_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.flush().await?;

        return Ok(());
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let file_path = self.get_file_path(key)?;
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }
}
