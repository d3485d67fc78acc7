use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::extraction::ExtractionError;
use crate::inference::models::ModelSelectionError;
use crate::inference::InferenceError;
use crate::prompts::PromptError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ModelSelectionError> for AppError {
    fn from(error: ModelSelectionError) -> Self {
        AppError::Analysis(error.into())
    }
}

impl AppError {
    /// Status and machine-readable code for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Multipart(e) => (e.status(), "INVALID_UPLOAD"),
            AppError::Inference(e) => classify_inference(e),
            AppError::Analysis(e) => classify_analysis(e),
            AppError::Prompt(e) => classify_prompt(e),
            AppError::Extraction(ExtractionError::NotPdf) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EXTRACTION_FAILED"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn classify_inference(error: &InferenceError) -> (StatusCode, &'static str) {
    match error {
        InferenceError::Unreachable(_) | InferenceError::Timeout(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNREACHABLE")
        }
        InferenceError::Backend { .. } => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR"),
        InferenceError::Malformed(_) | InferenceError::EmptyResponse => {
            (StatusCode::BAD_GATEWAY, "MALFORMED_RESPONSE")
        }
    }
}

fn classify_prompt(error: &PromptError) -> (StatusCode, &'static str) {
    match error {
        PromptError::UnknownTemplate(_) => (StatusCode::NOT_FOUND, "UNKNOWN_USE_CASE"),
        PromptError::MissingVariable { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "TEMPLATE_ERROR")
        }
    }
}

fn classify_analysis(error: &AnalysisError) -> (StatusCode, &'static str) {
    match error {
        AnalysisError::EmptyDocument | AnalysisError::InvalidSettings(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        }
        AnalysisError::NoModelAvailable => (StatusCode::SERVICE_UNAVAILABLE, "NO_MODEL_AVAILABLE"),
        AnalysisError::Prompt(e) => classify_prompt(e),
        AnalysisError::ConsolidationUnavailable(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "CONSOLIDATION_UNAVAILABLE")
        }
        AnalysisError::Inference(e) => classify_inference(e),
        AnalysisError::TotalFailure { .. } => (StatusCode::BAD_GATEWAY, "TOTAL_FAILURE"),
        AnalysisError::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "CANCELLED"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
            other if status.is_server_error() => {
                tracing::error!("{code}: {other}");
                other.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
