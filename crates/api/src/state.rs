//! Shared application state for the Axum API server.

use std::sync::Arc;

use icvk_common::config::AppConfig;
use icvk_notifier::Dispatcher;

use crate::store::RegistrationStore;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RegistrationStore>,
    pub dispatcher: Dispatcher,
    pub config: AppConfig,
    /// Identifies this process run in `/ping` responses.
    pub server_id: i64,
}

impl AppState {
    pub fn new(store: Arc<dyn RegistrationStore>, dispatcher: Dispatcher, config: AppConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
            server_id: chrono::Utc::now().timestamp_millis(),
        }
    }
}
