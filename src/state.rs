//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::errors::AppResult;
use crate::session::{FileResultStore, ResultStore};

/// State shared across request handlers.
///
/// The result store is process-wide: every session on this server reads
/// and writes the same durable slot, which is what lets a result survive
/// the connection that produced it.
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Durable single-slot result store
    pub store: Arc<dyn ResultStore>,
}

impl AppState {
    /// Build application state from configuration.
    pub fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let store = FileResultStore::new(&config.result_store_path)
            .map_err(|e| crate::errors::AppError::Internal(e.to_string()))?;
        Ok(Arc::new(Self {
            config,
            store: Arc::new(store),
        }))
    }

    /// Test constructor with an explicit store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn ResultStore>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }
}
