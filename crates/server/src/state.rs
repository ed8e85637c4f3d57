use docket_core::{ArtifactStore, Config, Dispatcher, SanitizedConfig, TaskStore};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    config: Config,
    dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.dispatcher.as_ref()
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.dispatcher.store().as_ref()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        self.dispatcher.runner().artifacts()
    }
}
