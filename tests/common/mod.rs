//! Shared test utilities: scripted mock model and engine builders
#![allow(dead_code)]

use async_trait::async_trait;
use convoflow::core::ModelSettings;
use convoflow::engine::PipelineEngine;
use convoflow::model::{ChatMessage, ModelClient, ModelError, ModelFactory, ModelResponse};
use convoflow::store::{ProgramStore, ReloadPolicy};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock model that returns predefined responses in order
///
/// Useful for driving multi-turn scenarios deterministically: condition
/// checks and step executions consume responses in call order. Prompts
/// are recorded so tests can assert on interpolation.
pub struct MockModel {
    responses: Vec<String>,
    index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl MockModel {
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.into_iter().map(Into::into).collect(),
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    /// A model whose every call fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            responses: Vec::new(),
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    /// Number of completed model calls
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Full text of the most recent request, all messages joined
    pub fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse, ModelError> {
        if self.fail {
            return Err(ModelError::Api("mock model unavailable".to_string()));
        }

        let joined = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(joined);

        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(idx) {
            Some(response) => Ok(ModelResponse::new(response.clone())),
            None => Err(ModelError::Internal(format!(
                "MockModel: no response available for request {}",
                idx + 1
            ))),
        }
    }
}

/// Factory that hands out the same mock client for every program
pub struct MockModelFactory(pub Arc<MockModel>);

impl ModelFactory for MockModelFactory {
    fn create(&self, _settings: &ModelSettings) -> Arc<dyn ModelClient> {
        self.0.clone()
    }
}

/// Write program documents into `dir` and build an engine over them
pub async fn engine_with(
    dir: &Path,
    docs: &[(&str, &str)],
    model: Arc<MockModel>,
) -> PipelineEngine {
    for (file, doc) in docs {
        std::fs::write(dir.join(file), doc).unwrap();
    }
    let store = Arc::new(ProgramStore::new(dir, ReloadPolicy::Never));
    store.load().await.unwrap();
    PipelineEngine::new(store, Arc::new(MockModelFactory(model)))
}
