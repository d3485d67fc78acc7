//! Model selection against the backend's installed-model list.

use tracing::{debug, warn};

use crate::inference::{InferenceClient, InferenceError};

/// Families that handle long-form document analysis reasonably well.
const PREFERRED_FAMILIES: &[&str] = &["mistral", "llama", "codellama", "dolphin"];

#[derive(Debug, thiserror::Error)]
pub enum ModelSelectionError {
    #[error("No model available on the inference backend")]
    NoModelAvailable,

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Picks the model for a request.
///
/// Lists installed models first so an empty backend fails fast. A requested
/// model is passed through as-is (the backend validates it); otherwise the
/// configured default, then a preferred family, then the first installed model.
pub async fn resolve_model(
    client: &dyn InferenceClient,
    requested: Option<&str>,
    default_model: Option<&str>,
) -> Result<String, ModelSelectionError> {
    let installed = client.list_models().await?;
    if installed.is_empty() {
        warn!("Inference backend reports no installed models");
        return Err(ModelSelectionError::NoModelAvailable);
    }

    if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
        return Ok(model.to_string());
    }
    if let Some(model) = default_model.map(str::trim).filter(|m| !m.is_empty()) {
        return Ok(model.to_string());
    }

    let chosen = preferred_models(&installed)
        .into_iter()
        .next()
        .unwrap_or(&installed[0])
        .clone();
    debug!("No model requested; selected {chosen}");
    Ok(chosen)
}

/// Installed models whose name contains a preferred family, in listing order.
pub fn preferred_models(installed: &[String]) -> Vec<&String> {
    installed
        .iter()
        .filter(|m| {
            let name = m.to_lowercase();
            PREFERRED_FAMILIES.iter().any(|family| name.contains(family))
        })
        .collect()
}
