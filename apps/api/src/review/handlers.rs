use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::document::normalize_whitespace;
use crate::errors::AppError;
use crate::inference::{GenerateRequest, GenerationOptions};
use crate::review::{ResumeReview, ReviewOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub text: String,
    pub model: Option<String>,
    pub options: Option<GenerationOptions>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub model: String,
    #[serde(flatten)]
    pub outcome: ReviewOutcome,
    /// Downloadable plain-text rendering of `review`.
    pub report_text: String,
}

/// POST /api/v1/resume/review
///
/// Asks the model for a JSON evaluation of the resume text. `parsed` is false
/// when the answer could not be read and the placeholder review was returned.
pub async fn handle_review(
    State(state): State<AppState>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let resume = normalize_whitespace(&request.text);
    if resume.is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    let options = request.options.unwrap_or_default();
    options.validate().map_err(AppError::Validation)?;

    let prompt = state
        .registry
        .render("resume_review", &[("document", resume.as_str())])?;
    let model = state.resolve_model(request.model.as_deref()).await?;

    let raw = state
        .client
        .generate(&GenerateRequest {
            model: model.clone(),
            prompt,
            options,
        })
        .await?;

    let outcome = ResumeReview::from_model_output(&raw);
    info!(
        "Resume review with {model}: rating {} (parsed: {})",
        outcome.review.overall_rating, outcome.parsed
    );

    let report_text = outcome.review.to_report_text();
    Ok(Json(ReviewResponse {
        model,
        outcome,
        report_text,
    }))
}
