use std::sync::Arc;

use kern_match::SearchEngine;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Query engine (shared across requests)
    pub engine: Arc<SearchEngine>,
}

impl ServerState {
    pub fn new(config: ServerConfig, engine: Arc<SearchEngine>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
        }
    }
}
