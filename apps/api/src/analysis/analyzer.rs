//! Chunked Document Analyzer.
//!
//! Flow: route by word count →
//!   single-shot: one generate call with the whole document, or
//!   chunked: split → one generate call per section (sequential, fixed pause
//!   between calls, failures recorded and skipped) → aggregate → consolidation call.
//!
//! No retries. No state survives an `analyze` call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::document::{truncate_chars, Chunk, Document};
use crate::analysis::error::{AnalysisError, FailureKind};
use crate::analysis::report::{
    aggregate_sections, status_for, AnalysisMode, AnalysisReport, AnalysisStatus, SectionOutcome,
    SectionResult,
};
use crate::inference::{GenerateRequest, GenerationOptions, InferenceClient};
use crate::prompts::{AnalysisPrompts, PromptRegistry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    /// Upper bound on words per section.
    pub max_words: usize,
    /// Documents with at most this many words are analyzed in one call.
    pub threshold: usize,
    /// Prefix of the aggregate sent to the consolidation call.
    pub consolidation_prefix_chars: usize,
    /// Fixed pause between consecutive section calls.
    pub section_pause: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_words: 600,
            threshold: 800,
            consolidation_prefix_chars: 2000,
            section_pause: Duration::from_secs(1),
        }
    }
}

impl AnalysisSettings {
    pub fn with_overrides(self, max_words: Option<usize>, threshold: Option<usize>) -> Self {
        Self {
            max_words: max_words.unwrap_or(self.max_words),
            threshold: threshold.unwrap_or(self.threshold),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_words == 0 {
            return Err(AnalysisError::InvalidSettings(
                "max_words must be at least 1".to_string(),
            ));
        }
        if self.threshold == 0 {
            return Err(AnalysisError::InvalidSettings(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.consolidation_prefix_chars == 0 {
            return Err(AnalysisError::InvalidSettings(
                "consolidation_prefix_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Inclusive on the single-shot side.
    pub fn mode_for(&self, document: &Document) -> AnalysisMode {
        if document.word_count() <= self.threshold {
            AnalysisMode::SingleShot
        } else {
            AnalysisMode::Chunked
        }
    }
}

/// Reported after each section call finishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionProgress {
    pub index: usize,
    pub total: usize,
    pub succeeded: bool,
}

/// Progress hook. Returning `false` stops before the next section call.
pub type ProgressHook<'a> = &'a mut (dyn FnMut(SectionProgress) -> bool + Send);

#[derive(Clone)]
pub struct Analyzer {
    client: Arc<dyn InferenceClient>,
    registry: Arc<PromptRegistry>,
    settings: AnalysisSettings,
}

impl Analyzer {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        registry: Arc<PromptRegistry>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            client,
            registry,
            settings,
        }
    }

    /// Same client and templates, different chunking settings.
    pub fn with_settings(&self, settings: AnalysisSettings) -> Self {
        Self {
            settings,
            ..self.clone()
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn client(&self) -> &dyn InferenceClient {
        self.client.as_ref()
    }

    /// Validates inputs and decides the mode before any network call.
    pub fn prepare(
        &self,
        document: &Document,
        prompts: &AnalysisPrompts,
        options: &GenerationOptions,
    ) -> Result<AnalysisMode, AnalysisError> {
        self.settings.validate()?;
        options
            .validate()
            .map_err(AnalysisError::InvalidSettings)?;

        let mode = self.settings.mode_for(document);
        if mode == AnalysisMode::Chunked && prompts.consolidation.is_none() {
            return Err(AnalysisError::ConsolidationUnavailable(
                prompts.use_case.clone(),
            ));
        }
        Ok(mode)
    }

    pub async fn analyze(
        &self,
        document: &Document,
        model: &str,
        prompts: &AnalysisPrompts,
        options: GenerationOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        let mut keep_going = |_: SectionProgress| true;
        self.analyze_with_progress(document, model, prompts, options, &mut keep_going)
            .await
    }

    pub async fn analyze_with_progress(
        &self,
        document: &Document,
        model: &str,
        prompts: &AnalysisPrompts,
        options: GenerationOptions,
        on_section: ProgressHook<'_>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let mode = self.prepare(document, prompts, &options)?;
        let analysis_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            "Analysis {analysis_id}: use_case={}, model={model}, words={}, mode={mode:?}",
            prompts.use_case,
            document.word_count()
        );

        let (status, sections, aggregate, text) = match mode {
            AnalysisMode::SingleShot => {
                let request = self.single_shot_request(document, model, prompts, options)?;
                let text = self.client.generate(&request).await?;
                (AnalysisStatus::Complete, Vec::new(), None, text)
            }
            AnalysisMode::Chunked => {
                let sections = self
                    .run_sections(document, model, prompts, options, on_section)
                    .await?;
                let aggregate = aggregate_or_total_failure(&sections)?;
                let request = self.consolidation_request(&aggregate, model, prompts, options)?;
                let text = self.client.generate(&request).await?;
                (status_for(&sections), sections, Some(aggregate), text)
            }
        };

        let elapsed_ms = clock.elapsed().as_millis() as u64;
        info!("Analysis {analysis_id} finished in {elapsed_ms}ms: {status:?}");

        Ok(AnalysisReport {
            analysis_id,
            use_case: prompts.use_case.clone(),
            model: model.to_string(),
            mode,
            status,
            word_count: document.word_count(),
            sections,
            aggregate,
            text,
            started_at,
            elapsed_ms,
        })
    }

    /// Runs every section call in order. A failed call is recorded and the
    /// loop moves on; nothing here aborts the remaining sections except the hook.
    pub async fn run_sections(
        &self,
        document: &Document,
        model: &str,
        prompts: &AnalysisPrompts,
        options: GenerationOptions,
        on_section: ProgressHook<'_>,
    ) -> Result<Vec<SectionResult>, AnalysisError> {
        let chunks = document.chunks(self.settings.max_words);
        let total = chunks.len();
        let mut sections = Vec::with_capacity(total);

        for chunk in &chunks {
            if chunk.index > 1 && !self.settings.section_pause.is_zero() {
                tokio::time::sleep(self.settings.section_pause).await;
            }

            info!("Processing section {}/{}", chunk.index, total);
            let request = self.section_request(chunk, total, model, prompts, options)?;
            let outcome = match self.client.generate(&request).await {
                Ok(text) => SectionOutcome::Succeeded { text },
                Err(e) => {
                    warn!("Section {}/{} failed: {e}", chunk.index, total);
                    SectionOutcome::Failed {
                        kind: FailureKind::from(&e),
                        error: e.to_string(),
                    }
                }
            };

            let succeeded = matches!(outcome, SectionOutcome::Succeeded { .. });
            sections.push(SectionResult {
                index: chunk.index,
                word_count: chunk.word_count,
                outcome,
            });

            let keep_going = on_section(SectionProgress {
                index: chunk.index,
                total,
                succeeded,
            });
            if !keep_going && chunk.index < total {
                info!("Section loop stopped by caller after {}/{}", chunk.index, total);
                return Err(AnalysisError::Cancelled);
            }
        }

        Ok(sections)
    }

    pub fn single_shot_request(
        &self,
        document: &Document,
        model: &str,
        prompts: &AnalysisPrompts,
        options: GenerationOptions,
    ) -> Result<GenerateRequest, AnalysisError> {
        let prompt = self
            .registry
            .render(&prompts.single_shot, &[("document", document.text())])?;
        Ok(request(model, prompt, options))
    }

    fn section_request(
        &self,
        chunk: &Chunk,
        total: usize,
        model: &str,
        prompts: &AnalysisPrompts,
        options: GenerationOptions,
    ) -> Result<GenerateRequest, AnalysisError> {
        let index = chunk.index.to_string();
        let count = total.to_string();
        let prompt = self.registry.render(
            &prompts.section,
            &[
                ("document", chunk.text.as_str()),
                ("section_index", index.as_str()),
                ("section_count", count.as_str()),
            ],
        )?;
        Ok(request(model, prompt, options))
    }

    /// Builds the consolidation call over a bounded prefix of the aggregate.
    pub fn consolidation_request(
        &self,
        aggregate: &str,
        model: &str,
        prompts: &AnalysisPrompts,
        options: GenerationOptions,
    ) -> Result<GenerateRequest, AnalysisError> {
        let template = prompts
            .consolidation
            .as_deref()
            .ok_or_else(|| AnalysisError::ConsolidationUnavailable(prompts.use_case.clone()))?;
        let report = truncate_chars(aggregate, self.settings.consolidation_prefix_chars);
        let prompt = self.registry.render(template, &[("report", report)])?;
        Ok(request(model, prompt, options))
    }
}

/// Aggregate of the successful sections, or `TotalFailure` when none succeeded.
pub fn aggregate_or_total_failure(sections: &[SectionResult]) -> Result<String, AnalysisError> {
    aggregate_sections(sections).ok_or_else(|| AnalysisError::TotalFailure {
        total_sections: sections.len(),
        failures: sections.iter().filter_map(SectionResult::failure).collect(),
    })
}

fn request(model: &str, prompt: String, options: GenerationOptions) -> GenerateRequest {
    GenerateRequest {
        model: model.to_string(),
        prompt,
        options,
    }
}
