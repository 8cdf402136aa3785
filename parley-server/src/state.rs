//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::chat::Relay;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::entities::SqliteStore;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversation and todo store.
    pub store: Arc<SqliteStore>,
    /// Hosted chat-completion API.
    pub completion: Arc<dyn CompletionClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            completion,
        }
    }

    /// A relay bound to this state's store and completion client.
    pub fn relay(&self) -> Relay<SqliteStore> {
        Relay::new(Arc::clone(&self.store), Arc::clone(&self.completion))
    }
}
