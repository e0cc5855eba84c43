pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::hub::{Hub, HubHandle};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub config: Arc<Config>,
}

impl AppState {
    /// Start the hub and wrap it with the configuration.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(config: Config) -> Self {
        let hub = Hub::spawn(config.hub_mailbox_capacity);
        Self {
            hub,
            config: Arc::new(config),
        }
    }
}
