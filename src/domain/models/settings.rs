#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

use anyhow::Result;
use serde_derive::Deserialize;
use serde_derive::Serialize;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub server_url: String,
    pub model: String,
    pub save_history: bool,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    server_url: Option<String>,
    model: Option<String>,
    save_history: Option<bool>,
}

impl Default for Settings {
    fn default() -> Settings {
        return Settings {
            server_url: DEFAULT_SERVER_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            save_history: true,
        };
    }
}

impl Settings {
    /// Layers a stored settings record over `self`. Fields missing from the
    /// record keep their current value.
    pub fn overlay(&self, raw: &str) -> Result<Settings> {
        let stored: StoredSettings = serde_json::from_str(raw)?;

        return Ok(Settings {
            server_url: stored
                .server_url
                .unwrap_or_else(|| return self.server_url.to_string()),
            model: stored.model.unwrap_or_else(|| return self.model.to_string()),
            save_history: stored.save_history.unwrap_or(self.save_history),
        });
    }

    /// Trims user input, falling back to `defaults` for blank fields.
    pub fn sanitize(self, defaults: &Settings) -> Settings {
        let mut server_url = self.server_url.trim().to_string();
        if server_url.is_empty() {
            server_url = defaults.server_url.to_string();
        }

        let mut model = self.model.trim().to_string();
        if model.is_empty() {
            model = defaults.model.to_string();
        }

        return Settings {
            server_url,
            model,
            save_history: self.save_history,
        };
    }

    /// Server address without the scheme, used for display.
    pub fn server_label(&self) -> String {
        return self
            .server_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();
    }
}
