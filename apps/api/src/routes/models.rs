use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::inference::models::preferred_models;
use crate::inference::{GenerateRequest, GenerationOptions, InferenceError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub connected: bool,
    pub models: Vec<String>,
    /// Installed models from the families chosen when a request names none.
    pub preferred: Vec<String>,
    pub default_model: Option<String>,
}

/// GET /api/v1/models
///
/// Installed models. An unreachable backend is reported as `connected: false`
/// with no models; other backend failures are errors.
pub async fn handle_list_models(
    State(state): State<AppState>,
) -> Result<Json<ModelsResponse>, AppError> {
    let (connected, models) = match state.client.list_models().await {
        Ok(models) => (true, models),
        Err(e @ (InferenceError::Unreachable(_) | InferenceError::Timeout(_))) => {
            warn!("Inference backend not reachable: {e}");
            (false, Vec::new())
        }
        Err(e) => return Err(e.into()),
    };
    let preferred = preferred_models(&models).into_iter().cloned().collect();

    Ok(Json(ModelsResponse {
        connected,
        models,
        preferred,
        default_model: state.config.default_model.clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ModelProbeRequest {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ModelProbeResponse {
    pub model: String,
    pub working: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/v1/models/test
///
/// Sends a tiny prompt to one model. A failing model is reported in the body,
/// not as an HTTP error.
pub async fn handle_test_model(
    State(state): State<AppState>,
    Json(request): Json<ModelProbeRequest>,
) -> Result<Json<ModelProbeResponse>, AppError> {
    let model = request.model.trim().to_string();
    if model.is_empty() {
        return Err(AppError::Validation("model cannot be empty".to_string()));
    }

    let prompt = state.registry.render("model_probe", &[])?;
    let probe = GenerateRequest {
        model: model.clone(),
        prompt,
        options: GenerationOptions {
            num_predict: 10,
            ..Default::default()
        },
    };

    let response = match state.client.generate(&probe).await {
        Ok(reply) => ModelProbeResponse {
            model,
            working: true,
            reply: Some(reply.trim().to_string()),
            error: None,
        },
        Err(e) => {
            warn!("Model probe for {model} failed: {e}");
            ModelProbeResponse {
                model,
                working: false,
                reply: None,
                error: Some(e.to_string()),
            }
        }
    };

    Ok(Json(response))
}
