use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::errors::AppError;
use crate::inference::models::resolve_model;
use crate::inference::InferenceClient;
use crate::prompts::PromptRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable inference backend. `OllamaClient` in production.
    pub client: Arc<dyn InferenceClient>,
    pub registry: Arc<PromptRegistry>,
    /// Analyzer built with the configured chunking settings.
    pub analyzer: Analyzer,
    pub config: Config,
}

impl AppState {
    pub fn new(client: Arc<dyn InferenceClient>, registry: PromptRegistry, config: Config) -> Self {
        let registry = Arc::new(registry);
        let analyzer = Analyzer::new(
            client.clone(),
            registry.clone(),
            config.analysis_settings(),
        );
        Self {
            client,
            registry,
            analyzer,
            config,
        }
    }

    /// Picks the model for a request: the requested one, else the configured
    /// default, else a preferred installed model.
    pub async fn resolve_model(&self, requested: Option<&str>) -> Result<String, AppError> {
        let model = resolve_model(
            self.client.as_ref(),
            requested,
            self.config.default_model.as_deref(),
        )
        .await?;
        Ok(model)
    }
}
