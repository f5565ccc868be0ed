use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::PgStore;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone: the store wraps a pool and the config is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: PgStore, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
