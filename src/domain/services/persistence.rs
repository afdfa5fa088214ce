#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;

use anyhow::Result;

use crate::domain::models::Message;
use crate::domain::models::Settings;
use crate::domain::models::StorageBox;
use crate::domain::models::Transcript;

pub const SETTINGS_KEY: &str = "neon/settings";
pub const HISTORY_KEY: &str = "neon/history";

/// Settings and history records on top of a `Storage`. Storage failures are
/// logged and otherwise ignored, so the client keeps working in memory.
#[derive(Clone)]
pub struct Persistence {
    storage: StorageBox,
}

impl Persistence {
    pub fn new(storage: StorageBox) -> Persistence {
        return Persistence { storage };
    }

    pub async fn load_settings(&self, defaults: &Settings) -> Settings {
        match self.try_load_settings(defaults).await {
            Ok(settings) => return settings,
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to load settings, using defaults");
                return defaults.clone();
            }
        }
    }

    /// Stores the settings record. Turning history off also removes the
    /// stored history.
    pub async fn save_settings(&self, settings: &Settings) {
        if let Err(err) = self.try_save_settings(settings).await {
            tracing::warn!(error = ?err, "Failed to save settings");
        }

        if !settings.save_history {
            self.remove_history().await;
        }
    }

    pub async fn load_history(&self, settings: &Settings) -> Transcript {
        if !settings.save_history {
            return Transcript::default();
        }

        match self.try_load_history().await {
            Ok(messages) => return Transcript::from_messages(messages),
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to load history");
                return Transcript::default();
            }
        }
    }

    pub async fn save_history(&self, settings: &Settings, messages: &[Message]) {
        if !settings.save_history {
            return;
        }

        if let Err(err) = self.try_save_history(messages).await {
            tracing::warn!(error = ?err, "Failed to save history");
        }
    }

    pub async fn remove_history(&self) {
        if let Err(err) = self.storage.remove(HISTORY_KEY).await {
            tracing::warn!(error = ?err, "Failed to remove history");
        }
    }

    async fn try_load_settings(&self, defaults: &Settings) -> Result<Settings> {
        if let Some(raw) = self.storage.load(SETTINGS_KEY).await? {
            return defaults.overlay(&raw);
        }

        return Ok(defaults.clone());
    }

    async fn try_save_settings(&self, settings: &Settings) -> Result<()> {
        let payload = serde_json::to_string(settings)?;
        self.storage.save(SETTINGS_KEY, &payload).await?;

        return Ok(());
    }

    async fn try_load_history(&self) -> Result<Vec<Message>> {
        if let Some(raw) = self.storage.load(HISTORY_KEY).await? {
            let messages: Vec<Message> = serde_json::from_str(&raw)?;
            return Ok(messages);
        }

        return Ok(vec![]);
    }

    async fn try_save_history(&self, messages: &[Message]) -> Result<()> {
        let payload = serde_json::to_string(messages)?;
        self.storage.save(HISTORY_KEY, &payload).await?;

        return Ok(());
    }
}
