pub mod ollama;

use std::sync::Arc;

use crate::domain::models::BackendBox;

pub struct BackendManager {}

impl BackendManager {
    pub fn get() -> BackendBox {
        return Arc::new(ollama::Ollama::default());
    }
}
