// Employee Lookup: single-call extraction of one employee's details, or of
// every employee name, from an employee report. Only a bounded prefix of the
// report reaches the prompt.

pub mod handlers;

use crate::analysis::document::{normalize_whitespace, truncate_chars};
use crate::prompts::{PromptError, PromptRegistry};

/// Report text as it will appear in the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContext {
    pub text: String,
    pub truncated: bool,
}

impl ReportContext {
    /// Collapses whitespace and keeps the first `max_chars` characters.
    pub fn new(report: &str, max_chars: usize) -> Self {
        let normalized = normalize_whitespace(report);
        let text = truncate_chars(&normalized, max_chars);
        let truncated = text.len() < normalized.len();
        Self {
            text: text.to_string(),
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

pub fn employee_lookup_prompt(
    registry: &PromptRegistry,
    context: &ReportContext,
    employee_name: &str,
    organization: &str,
) -> Result<String, PromptError> {
    registry.render(
        "employee_lookup",
        &[
            ("employee_name", employee_name),
            ("organization", organization),
            ("document", &context.text),
        ],
    )
}

pub fn employee_roster_prompt(
    registry: &PromptRegistry,
    context: &ReportContext,
    organization: &str,
) -> Result<String, PromptError> {
    registry.render(
        "employee_roster",
        &[("organization", organization), ("document", &context.text)],
    )
}
