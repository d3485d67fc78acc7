//! Prompt registry — one configuration-driven mapping from template id to
//! template text, shared by every use case.
//!
//! Built-in templates live in `templates.rs`; a JSON file can override or add
//! entries at startup (`PROMPT_TEMPLATES_PATH`).

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;
use tracing::info;

pub mod templates;

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("Unknown prompt template '{0}'")]
    UnknownTemplate(String),

    #[error("Prompt template '{template}' needs a value for '{{{variable}}}'")]
    MissingVariable { template: String, variable: String },
}

#[derive(Debug, Clone)]
pub struct PromptRegistry {
    templates: HashMap<String, String>,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptRegistry {
    pub fn builtin() -> Self {
        let templates = templates::BUILTIN
            .iter()
            .map(|(id, template)| (id.to_string(), template.to_string()))
            .collect();
        Self { templates }
    }

    /// Built-ins plus the overrides in `path`, if given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let registry = Self::builtin();
        let Some(path) = path else {
            return Ok(registry);
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt templates from {}", path.display()))?;
        let overrides: HashMap<String, String> = serde_json::from_str(&raw).with_context(|| {
            format!(
                "Prompt templates file {} must be a JSON object of id -> template",
                path.display()
            )
        })?;

        info!(
            "Loaded {} prompt template override(s) from {}",
            overrides.len(),
            path.display()
        );
        Ok(registry.with_overrides(overrides))
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.templates.extend(overrides);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn template(&self, id: &str) -> Result<&str, PromptError> {
        self.templates
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| PromptError::UnknownTemplate(id.to_string()))
    }

    /// Sorted template ids.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Fills every `{name}` placeholder of template `id` from `vars`.
    ///
    /// Single pass: substituted values are copied verbatim, so a document that
    /// happens to contain `{employee_name}` is not expanded. Unused vars are fine;
    /// a placeholder with no value is an error.
    pub fn render(&self, id: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let template = self.template(id)?;
        let vars_len: usize = vars.iter().map(|(_, value)| value.len()).sum();
        let mut out = String::with_capacity(template.len() + vars_len);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match after.find('}').map(|close| &after[..close]) {
                Some(name) if is_placeholder(name) => {
                    let value = vars
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| PromptError::MissingVariable {
                            template: id.to_string(),
                            variable: name.to_string(),
                        })?;
                    out.push_str(value);
                    rest = &after[name.len() + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        Ok(out)
    }

    /// Resolves the three templates a chunked-capable analysis needs.
    ///
    /// Only base ids whose template embeds `{document}` qualify; section and
    /// consolidation variants and the other features' templates are unknown
    /// use cases here.
    pub fn analysis_prompts(&self, use_case: &str) -> Result<AnalysisPrompts, PromptError> {
        let unknown = || PromptError::UnknownTemplate(use_case.to_string());
        if use_case.contains('.') || templates::NON_ANALYSIS.contains(&use_case) {
            return Err(unknown());
        }
        if !self.template(use_case)?.contains("{document}") {
            return Err(unknown());
        }

        let section_id = format!("{use_case}.section");
        let section = if self.contains(&section_id) {
            section_id
        } else {
            use_case.to_string()
        };

        let consolidation_id = format!("{use_case}.consolidation");
        let consolidation = self.contains(&consolidation_id).then_some(consolidation_id);

        Ok(AnalysisPrompts {
            use_case: use_case.to_string(),
            single_shot: use_case.to_string(),
            section,
            consolidation,
        })
    }
}

fn is_placeholder(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Template ids for one analysis use case.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPrompts {
    pub use_case: String,
    pub single_shot: String,
    /// Falls back to the single-shot template when no `.section` variant exists.
    pub section: String,
    /// Required only when the document is long enough to be chunked.
    pub consolidation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_registry_has_every_use_case() {
        let registry = PromptRegistry::builtin();
        for id in [
            "medical_report",
            "medical_report.consolidation",
            "resume_review",
            "employee_lookup",
            "employee_roster",
            "store_assistant",
            "general_summary",
        ] {
            assert!(registry.contains(id), "missing template {id}");
        }
    }

    #[test]
    fn test_render_fills_named_placeholders() {
        let registry = PromptRegistry::builtin();
        let prompt = registry
            .render(
                "employee_lookup",
                &[
                    ("employee_name", "Jane Doe"),
                    ("organization", "Acme"),
                    ("document", "Jane Doe, Engineering"),
                ],
            )
            .unwrap();
        assert!(prompt.contains("named \"Jane Doe\" from Acme"));
        assert!(prompt.ends_with("Jane Doe, Engineering"));
    }

    #[test]
    fn test_render_does_not_expand_braces_inside_values() {
        let registry = PromptRegistry::builtin().with_overrides(HashMap::from([(
            "probe".to_string(),
            "A={a} B={b}".to_string(),
        )]));
        let prompt = registry
            .render("probe", &[("a", "{b}"), ("b", "x")])
            .unwrap();
        assert_eq!(prompt, "A={b} B=x");
    }

    #[test]
    fn test_render_keeps_json_braces_in_template() {
        let registry = PromptRegistry::builtin();
        let prompt = registry
            .render("resume_review", &[("document", "Rust engineer")])
            .unwrap();
        assert!(prompt.contains("\"overall_rating\": <score out of 10>"));
        assert!(prompt.contains("{\n    \"overall_rating\""));
    }

    #[test]
    fn test_render_reports_missing_variable() {
        let registry = PromptRegistry::builtin();
        let err = registry
            .render("employee_lookup", &[("document", "text")])
            .unwrap_err();
        assert!(matches!(err, PromptError::MissingVariable { .. }));
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let registry = PromptRegistry::builtin();
        assert_eq!(
            registry.render("dice_game", &[]).unwrap_err(),
            PromptError::UnknownTemplate("dice_game".to_string())
        );
    }

    #[test]
    fn test_analysis_prompts_fall_back_to_base_template() {
        let registry = PromptRegistry::builtin().with_overrides(HashMap::from([(
            "lab_results".to_string(),
            "Explain: {document}".to_string(),
        )]));

        let prompts = registry.analysis_prompts("lab_results").unwrap();
        assert_eq!(prompts.section, "lab_results");
        assert_eq!(prompts.consolidation, None);

        let medical = registry.analysis_prompts("medical_report").unwrap();
        assert_eq!(medical.section, "medical_report.section");
        assert_eq!(
            medical.consolidation.as_deref(),
            Some("medical_report.consolidation")
        );
    }

    #[test]
    fn test_only_document_templates_are_analysis_use_cases() {
        let registry = PromptRegistry::builtin().with_overrides(HashMap::from([(
            "greeting".to_string(),
            "Say hello".to_string(),
        )]));

        for id in [
            "employee_lookup",
            "store_assistant",
            "resume_review",
            "model_probe",
            "medical_report.consolidation",
            "medical_report.section",
            "greeting",
        ] {
            assert_eq!(
                registry.analysis_prompts(id).unwrap_err(),
                PromptError::UnknownTemplate(id.to_string()),
                "{id} should not be an analysis use case"
            );
        }
        assert!(registry.analysis_prompts("general_summary").is_ok());
    }

    #[test]
    fn test_load_applies_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"medical_report": "Short: {{document}}", "invoice": "Total for {{document}}"}}"#
        )
        .unwrap();

        let registry = PromptRegistry::load(Some(file.path())).unwrap();
        assert_eq!(
            registry.render("medical_report", &[("document", "x")]).unwrap(),
            "Short: x"
        );
        assert!(registry.contains("invoice"));
        assert!(registry.contains("resume_review"));
    }

    #[test]
    fn test_load_rejects_non_object_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        assert!(PromptRegistry::load(Some(file.path())).is_err());
    }
}
