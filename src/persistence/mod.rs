//! Persistence layer for session state
//!
//! The engine itself never stores state; these backends exist for the CLI
//! driver and any embedding application that wants a ready-made store.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteSessionStore;

use crate::core::SessionState;
use anyhow::Result;

/// Trait for session-state backends
#[async_trait::async_trait]
pub trait SessionBackend: Send + Sync {
    /// Save (insert or replace) a session's state
    async fn save_state(&self, state: &SessionState) -> Result<()>;

    /// Load a session's state by id
    async fn load_state(&self, session_id: &str) -> Result<Option<SessionState>>;

    /// Delete a session's state
    async fn delete_state(&self, session_id: &str) -> Result<()>;

    /// List all known session ids
    async fn list_sessions(&self) -> Result<Vec<String>>;
}

/// In-memory backend (for testing or ephemeral use)
pub struct InMemorySessionStore {
    states: tokio::sync::RwLock<std::collections::HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            states: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionBackend for InMemorySessionStore {
    async fn save_state(&self, state: &SessionState) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn load_state(&self, session_id: &str) -> Result<Option<SessionState>> {
        let states = self.states.read().await;
        Ok(states.get(session_id).cloned())
    }

    async fn delete_state(&self, session_id: &str) -> Result<()> {
        let mut states = self.states.write().await;
        states.remove(session_id);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let states = self.states.read().await;
        let mut ids: Vec<String> = states.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
