use std::sync::Arc;
use inkpress_core::{Config, Converter, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    converter: Arc<dyn Converter>,
}

impl AppState {
    pub fn new(config: Config, converter: Arc<dyn Converter>) -> Self {
        Self { config, converter }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }
}
