use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::error::{FailureKind, SectionFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    SingleShot,
    Chunked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    PartialFailure {
        failed_sections: Vec<usize>,
        total_sections: usize,
    },
}

impl AnalysisStatus {
    /// Failure taxonomy entry for this status; `None` when complete.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AnalysisStatus::Complete => None,
            AnalysisStatus::PartialFailure { .. } => Some(FailureKind::PartialFailure),
        }
    }
}

/// Per-section outcome. A failed section carries no text at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SectionOutcome {
    Succeeded { text: String },
    Failed { kind: FailureKind, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionResult {
    pub index: usize,
    pub word_count: usize,
    #[serde(flatten)]
    pub outcome: SectionOutcome,
}

impl SectionResult {
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            SectionOutcome::Succeeded { text } => Some(text),
            SectionOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<SectionFailure> {
        match &self.outcome {
            SectionOutcome::Succeeded { .. } => None,
            SectionOutcome::Failed { kind, error } => Some(SectionFailure {
                index: self.index,
                kind: *kind,
                message: error.clone(),
            }),
        }
    }
}

/// Final result of one `analyze` call.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub use_case: String,
    pub model: String,
    pub mode: AnalysisMode,
    pub status: AnalysisStatus,
    pub word_count: usize,
    /// Empty in single-shot mode.
    pub sections: Vec<SectionResult>,
    /// Labelled section texts joined in order; `None` in single-shot mode.
    pub aggregate: Option<String>,
    pub text: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Joins successful sections as `**Section i:**` blocks separated by a blank line.
/// Failed sections are skipped; `None` when nothing succeeded.
pub fn aggregate_sections(sections: &[SectionResult]) -> Option<String> {
    let blocks: Vec<String> = sections
        .iter()
        .filter_map(|s| {
            s.text()
                .map(|text| format!("**Section {}:**\n{}", s.index, text.trim()))
        })
        .collect();

    (!blocks.is_empty()).then(|| blocks.join("\n\n"))
}

/// Status for a finished chunked run with at least one success.
pub fn status_for(sections: &[SectionResult]) -> AnalysisStatus {
    let failed_sections: Vec<usize> = sections
        .iter()
        .filter(|s| s.text().is_none())
        .map(|s| s.index)
        .collect();

    if failed_sections.is_empty() {
        AnalysisStatus::Complete
    } else {
        AnalysisStatus::PartialFailure {
            failed_sections,
            total_sections: sections.len(),
        }
    }
}
