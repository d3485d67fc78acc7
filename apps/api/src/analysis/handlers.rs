//! Axum route handlers for the Analysis API.

use std::convert::Infallible;

use axum::{
    extract::{Multipart, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use crate::analysis::streaming::{stream_analysis, AnalysisEvent};
use crate::analysis::{AnalysisReport, Analyzer, Document};
use crate::errors::AppError;
use crate::extraction::extract_pdf_text_blocking;
use crate::inference::GenerationOptions;
use crate::prompts::AnalysisPrompts;
use crate::state::AppState;

pub const DEFAULT_USE_CASE: &str = "medical_report";

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(flatten)]
    pub params: AnalyzeParams,
}

/// Everything about an analysis except the document itself.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeParams {
    pub model: Option<String>,
    pub use_case: Option<String>,
    pub max_words: Option<usize>,
    pub threshold: Option<usize>,
    pub options: Option<GenerationOptions>,
}

/// A validated request, ready to hand to the analyzer.
struct AnalysisJob {
    analyzer: Analyzer,
    document: Document,
    model: String,
    prompts: AnalysisPrompts,
    options: GenerationOptions,
}

/// Checks the document, use case, and settings before asking the backend
/// which model to use.
async fn prepare_job(
    state: &AppState,
    text: &str,
    params: AnalyzeParams,
) -> Result<AnalysisJob, AppError> {
    let document = Document::new(text)?;

    let use_case = params
        .use_case
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_USE_CASE);
    let prompts = state.registry.analysis_prompts(use_case)?;

    let settings = state
        .analyzer
        .settings()
        .with_overrides(params.max_words, params.threshold);
    let analyzer = state.analyzer.with_settings(settings);
    let options = params.options.unwrap_or_default();
    analyzer.prepare(&document, &prompts, &options)?;

    let model = state.resolve_model(params.model.as_deref()).await?;

    Ok(AnalysisJob {
        analyzer,
        document,
        model,
        prompts,
        options,
    })
}

async fn run_job(job: AnalysisJob) -> Result<AnalysisReport, AppError> {
    let report = job
        .analyzer
        .analyze(&job.document, &job.model, &job.prompts, job.options)
        .await?;

    match report.status.failure_kind() {
        Some(kind) => warn!(
            "Analysis {} finished with {:?}: {:?}",
            report.analysis_id, kind, report.status
        ),
        None => info!(
            "Analysis {} finished: {:?} with {} in {}ms",
            report.analysis_id, report.mode, report.model, report.elapsed_ms
        ),
    }
    Ok(report)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Analyzes already-extracted text. Long documents are chunked; the response
/// carries per-section outcomes and the consolidated text.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>, AppError> {
    let job = prepare_job(&state, &request.text, request.params).await?;
    Ok(Json(run_job(job).await?))
}

/// POST /api/v1/analyze/upload
///
/// Multipart form: `file` (PDF) plus optional `model`, `use_case`,
/// `max_words`, `threshold`, `temperature`, `top_p`, `num_predict` fields.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisReport>, AppError> {
    let mut file: Option<Bytes> = None;
    let mut params = AnalyzeParams::default();
    let mut options = GenerationOptions::default();
    let mut options_given = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file = Some(field.bytes().await?);
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "model" => params.model = Some(value),
            "use_case" => params.use_case = Some(value),
            "max_words" => params.max_words = Some(parse_field(&name, &value)?),
            "threshold" => params.threshold = Some(parse_field(&name, &value)?),
            "temperature" => {
                options.temperature = parse_field(&name, &value)?;
                options_given = true;
            }
            "top_p" => {
                options.top_p = parse_field(&name, &value)?;
                options_given = true;
            }
            "num_predict" => {
                options.num_predict = parse_field(&name, &value)?;
                options_given = true;
            }
            _ => {}
        }
    }
    if options_given {
        params.options = Some(options);
    }

    let file = file.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    info!("Extracting text from uploaded PDF ({} bytes)", file.len());
    let text = extract_pdf_text_blocking(file).await?;

    let job = prepare_job(&state, &text, params).await?;
    Ok(Json(run_job(job).await?))
}

/// POST /api/v1/analyze/stream
///
/// Same input as `/analyze`, answered as server-sent events: `started`,
/// `progress` per section, `snapshot`s of the final call, then `done` or
/// `error`. A client that disconnects stops the run.
pub async fn handle_analyze_stream(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let job = prepare_job(&state, &request.text, request.params).await?;
    let events = stream_analysis(
        job.analyzer,
        job.document,
        job.model,
        job.prompts,
        job.options,
    )?;

    Ok(Sse::new(events.map(|event| Ok(to_sse(&event)))).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &AnalysisEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            Event::default()
                .event("error")
                .data(format!("could not encode event: {e}"))
        })
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("'{name}' has an invalid value '{value}'")))
}
