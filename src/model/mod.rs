//! Language-model client seam
//!
//! The engine talks to the model through the [`ModelClient`] trait so tests
//! can swap in a scripted mock. Clients are built lazily by a
//! [`ModelFactory`] and cached per program name and version.

pub mod subprocess_client;

use crate::core::ModelSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use subprocess_client::SubprocessModelClient;

/// Error types for model operations
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One message in a model request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Response from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The reply content
    pub content: String,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Trait for model invocation - allows for different implementations
///
/// Implementations are stateless request executors; a single client is
/// shared across concurrent turns without locking.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a message sequence and return the model's reply
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse, ModelError>;
}

/// Builds model clients from per-program settings
pub trait ModelFactory: Send + Sync {
    fn create(&self, settings: &ModelSettings) -> Arc<dyn ModelClient>;
}

/// Configuration for the shipped subprocess client
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    /// Path to the LLM CLI executable
    ///
    /// If not provided, defaults to "llm" (assumes it's on PATH).
    pub command: Option<String>,

    /// Timeout for requests in seconds
    pub timeout_secs: u64,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 120,
        }
    }
}

impl ModelClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: String) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Factory for [`SubprocessModelClient`] instances
pub struct SubprocessModelFactory {
    config: ModelClientConfig,
}

impl SubprocessModelFactory {
    pub fn new(config: ModelClientConfig) -> Self {
        Self { config }
    }
}

impl ModelFactory for SubprocessModelFactory {
    fn create(&self, settings: &ModelSettings) -> Arc<dyn ModelClient> {
        let command = self
            .config
            .command
            .clone()
            .unwrap_or_else(|| "llm".to_string());
        Arc::new(SubprocessModelClient::new(
            command,
            settings.clone(),
            self.config.timeout_secs,
        ))
    }
}

/// Lazily built client cache keyed by `(program name, program version)`
pub struct ModelCache {
    factory: Arc<dyn ModelFactory>,
    clients: Mutex<HashMap<(String, String), Arc<dyn ModelClient>>>,
}

impl ModelCache {
    pub fn new(factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the client for a program
    pub fn client_for(&self, name: &str, version: &str, settings: &ModelSettings) -> Arc<dyn ModelClient> {
        let key = (name.to_string(), version.to_string());
        let mut clients = self.clients.lock().expect("model cache lock poisoned");
        clients
            .entry(key)
            .or_insert_with(|| self.factory.create(settings))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        created: AtomicUsize,
    }

    struct NullClient;

    #[async_trait]
    impl ModelClient for NullClient {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<ModelResponse, ModelError> {
            Ok(ModelResponse::new(""))
        }
    }

    impl ModelFactory for CountingFactory {
        fn create(&self, _settings: &ModelSettings) -> Arc<dyn ModelClient> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Arc::new(NullClient)
        }
    }

    #[test]
    fn test_cache_reuses_client_per_name_and_version() {
        let factory = Arc::new(CountingFactory {
            created: AtomicUsize::new(0),
        });
        let cache = ModelCache::new(factory.clone());
        let settings = ModelSettings::default();

        cache.client_for("default", "1.0", &settings);
        cache.client_for("default", "1.0", &settings);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        cache.client_for("default", "2.0", &settings);
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_model_client_config_builder() {
        let config = ModelClientConfig::new()
            .with_command("/usr/local/bin/llm".to_string())
            .with_timeout(600);

        assert_eq!(config.command, Some("/usr/local/bin/llm".to_string()));
        assert_eq!(config.timeout_secs, 600);
    }
}
