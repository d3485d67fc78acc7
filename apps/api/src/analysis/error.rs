use serde::Serialize;
use thiserror::Error;

use crate::inference::models::ModelSelectionError;
use crate::inference::InferenceError;
use crate::prompts::PromptError;

/// Failure taxonomy surfaced to callers. `PartialFailure` appears only as a
/// report status; the rest classify errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BackendUnreachable,
    BackendError,
    MalformedResponse,
    PartialFailure,
    TotalFailure,
}

impl From<&InferenceError> for FailureKind {
    fn from(error: &InferenceError) -> Self {
        match error {
            InferenceError::Unreachable(_) | InferenceError::Timeout(_) => {
                FailureKind::BackendUnreachable
            }
            InferenceError::Backend { .. } => FailureKind::BackendError,
            InferenceError::Malformed(_) | InferenceError::EmptyResponse => {
                FailureKind::MalformedResponse
            }
        }
    }
}

/// One section whose inference call failed. The section's text is absent.
#[derive(Debug, Clone, Serialize)]
pub struct SectionFailure {
    pub index: usize,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Invalid analysis settings: {0}")]
    InvalidSettings(String),

    #[error("No model available on the inference backend")]
    NoModelAvailable,

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Use case '{0}' has no consolidation template and cannot analyze long documents")]
    ConsolidationUnavailable(String),

    /// Single-shot call or consolidation call failed.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("All {total_sections} sections failed; first error: {}", first_message(.failures))]
    TotalFailure {
        total_sections: usize,
        failures: Vec<SectionFailure>,
    },

    #[error("Analysis cancelled by caller")]
    Cancelled,
}

fn first_message(failures: &[SectionFailure]) -> &str {
    failures
        .first()
        .map(|f| f.message.as_str())
        .unwrap_or("unknown")
}

impl AnalysisError {
    /// Taxonomy kind, or `None` for caller-side problems (bad input, config).
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            AnalysisError::NoModelAvailable => Some(FailureKind::BackendUnreachable),
            AnalysisError::Inference(e) => Some(FailureKind::from(e)),
            AnalysisError::TotalFailure { .. } => Some(FailureKind::TotalFailure),
            AnalysisError::EmptyDocument
            | AnalysisError::InvalidSettings(_)
            | AnalysisError::Prompt(_)
            | AnalysisError::ConsolidationUnavailable(_)
            | AnalysisError::Cancelled => None,
        }
    }
}

impl From<ModelSelectionError> for AnalysisError {
    fn from(error: ModelSelectionError) -> Self {
        match error {
            ModelSelectionError::NoModelAvailable => AnalysisError::NoModelAvailable,
            ModelSelectionError::Inference(e) => AnalysisError::Inference(e),
        }
    }
}
