mod analysis;
mod assistant;
mod config;
mod errors;
mod extraction;
mod inference;
mod lookup;
mod prompts;
mod review;
mod routes;
mod state;
mod structured;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::inference::OllamaClient;
use crate::prompts::PromptRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docsight v{}", env!("CARGO_PKG_VERSION"));

    // Initialize inference client
    let client = OllamaClient::new(
        &config.ollama_base_url,
        config.inference_timeout,
        config.model_list_timeout,
    )?;
    info!(
        "Inference backend: {} (timeout {}s)",
        client.base_url(),
        config.inference_timeout.as_secs()
    );

    // Load prompt templates (built-ins plus optional overrides)
    let registry = PromptRegistry::load(config.prompt_templates_path.as_deref())?;
    info!("Prompt templates: {}", registry.ids().join(", "));

    let settings = config.analysis_settings();
    info!(
        "Chunking: {} words per section, single-shot up to {} words",
        settings.max_words, settings.threshold
    );

    // Build app state
    let state = AppState::new(Arc::new(client), registry, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
