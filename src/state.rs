use std::sync::Arc;

use crate::config::Config;
use crate::db::Gateway;
use crate::service::GroupService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Group service; owns a handle to the connection pool
    pub groups: GroupService,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state around an established gateway
    pub fn new(gateway: Gateway, config: Config) -> Self {
        Self {
            groups: GroupService::new(gateway),
            config: Arc::new(config),
        }
    }
}
