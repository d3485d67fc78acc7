use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::inference::{GenerateRequest, GenerationOptions};
use crate::lookup::{employee_lookup_prompt, employee_roster_prompt, ReportContext};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmployeeSearchRequest {
    pub text: String,
    pub employee_name: String,
    pub organization: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeListRequest {
    pub text: String,
    pub organization: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub model: String,
    pub result: String,
    /// True when only a prefix of the report was sent to the model.
    pub context_truncated: bool,
}

/// POST /api/v1/employees/search
pub async fn handle_employee_search(
    State(state): State<AppState>,
    Json(request): Json<EmployeeSearchRequest>,
) -> Result<Json<LookupResponse>, AppError> {
    let employee_name = request.employee_name.trim();
    if employee_name.is_empty() {
        return Err(AppError::Validation(
            "employee_name cannot be empty".to_string(),
        ));
    }
    let context = report_context(&state, &request.text)?;
    let organization = organization(&state, request.organization.as_deref());

    let prompt = employee_lookup_prompt(&state.registry, &context, employee_name, organization)?;
    info!("Looking up employee '{employee_name}' in {organization} report");

    run_lookup(&state, request.model.as_deref(), prompt, context.truncated).await
}

/// POST /api/v1/employees/list
pub async fn handle_employee_list(
    State(state): State<AppState>,
    Json(request): Json<EmployeeListRequest>,
) -> Result<Json<LookupResponse>, AppError> {
    let context = report_context(&state, &request.text)?;
    let organization = organization(&state, request.organization.as_deref());

    let prompt = employee_roster_prompt(&state.registry, &context, organization)?;
    info!("Listing employees in {organization} report");

    run_lookup(&state, request.model.as_deref(), prompt, context.truncated).await
}

fn report_context(state: &AppState, text: &str) -> Result<ReportContext, AppError> {
    let context = ReportContext::new(text, state.config.lookup_context_chars);
    if context.is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    Ok(context)
}

fn organization<'a>(state: &'a AppState, requested: Option<&'a str>) -> &'a str {
    requested
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(&state.config.organization_name)
}

async fn run_lookup(
    state: &AppState,
    model: Option<&str>,
    prompt: String,
    context_truncated: bool,
) -> Result<Json<LookupResponse>, AppError> {
    let model = state.resolve_model(model).await?;
    let result = state
        .client
        .generate(&GenerateRequest {
            model: model.clone(),
            prompt,
            options: GenerationOptions::default(),
        })
        .await?;

    Ok(Json(LookupResponse {
        model,
        result: result.trim().to_string(),
        context_truncated,
    }))
}
