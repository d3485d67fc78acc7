use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::AnalysisSettings;

/// Application configuration loaded from environment variables.
/// Every key is optional; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_base_url: String,
    pub default_model: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub inference_timeout: Duration,
    pub model_list_timeout: Duration,
    pub chunk_max_words: usize,
    pub single_shot_threshold: usize,
    pub consolidation_prefix_chars: usize,
    pub section_pause: Duration,
    /// Document prefix handed to the employee lookup and roster prompts.
    pub lookup_context_chars: usize,
    pub prompt_templates_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
    /// Organization named in employee lookup prompts.
    pub organization_name: String,
    pub store_name: String,
    /// Company background used when a chat request brings none.
    pub store_context: String,
}

const DEFAULT_STORE_CONTEXT: &str = "A premium clothing company with 25+ years of experience \
offering formal wear, casual wear, traditional wear, a kids collection, and accessories. \
Services include custom tailoring, bulk discounts, and quality assurance.";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the
    /// process environment.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            ollama_base_url: var("OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            default_model: var("DEFAULT_MODEL"),
            port: parse_or(var("PORT"), "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            inference_timeout: Duration::from_secs(parse_or(
                var("INFERENCE_TIMEOUT_SECS"),
                "INFERENCE_TIMEOUT_SECS",
                300,
            )?),
            model_list_timeout: Duration::from_secs(parse_or(
                var("MODEL_LIST_TIMEOUT_SECS"),
                "MODEL_LIST_TIMEOUT_SECS",
                10,
            )?),
            chunk_max_words: parse_or(var("CHUNK_MAX_WORDS"), "CHUNK_MAX_WORDS", 600)?,
            single_shot_threshold: parse_or(
                var("SINGLE_SHOT_THRESHOLD"),
                "SINGLE_SHOT_THRESHOLD",
                800,
            )?,
            consolidation_prefix_chars: parse_or(
                var("CONSOLIDATION_PREFIX_CHARS"),
                "CONSOLIDATION_PREFIX_CHARS",
                2000,
            )?,
            section_pause: Duration::from_millis(parse_or(
                var("SECTION_PAUSE_MS"),
                "SECTION_PAUSE_MS",
                1000,
            )?),
            lookup_context_chars: parse_or(
                var("LOOKUP_CONTEXT_CHARS"),
                "LOOKUP_CONTEXT_CHARS",
                3000,
            )?,
            prompt_templates_path: var("PROMPT_TEMPLATES_PATH").map(PathBuf::from),
            max_upload_bytes: parse_or(
                var("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                20 * 1024 * 1024,
            )?,
            organization_name: var("ORGANIZATION_NAME")
                .unwrap_or_else(|| "the organization".to_string()),
            store_name: var("STORE_NAME").unwrap_or_else(|| "our store".to_string()),
            store_context: var("STORE_CONTEXT")
                .unwrap_or_else(|| DEFAULT_STORE_CONTEXT.to_string()),
        };

        config
            .analysis_settings()
            .validate()
            .context("Invalid chunking configuration")?;

        Ok(config)
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            max_words: self.chunk_max_words,
            threshold: self.single_shot_threshold,
            consolidation_prefix_chars: self.consolidation_prefix_chars,
            section_pause: self.section_pause,
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.default_model, None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.inference_timeout, Duration::from_secs(300));
        assert_eq!(config.model_list_timeout, Duration::from_secs(10));
        assert_eq!(config.max_upload_bytes, 20_971_520);
        assert_eq!(config.lookup_context_chars, 3000);
        assert_eq!(config.analysis_settings(), AnalysisSettings::default());
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = config_with(&[
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("DEFAULT_MODEL", "llama3:8b"),
            ("CHUNK_MAX_WORDS", "400"),
            ("SECTION_PAUSE_MS", "0"),
            ("PROMPT_TEMPLATES_PATH", "/etc/docsight/prompts.json"),
        ])
        .unwrap();
        assert_eq!(config.ollama_base_url, "http://gpu-box:11434");
        assert_eq!(config.default_model.as_deref(), Some("llama3:8b"));
        assert_eq!(config.chunk_max_words, 400);
        assert_eq!(config.section_pause, Duration::ZERO);
        assert_eq!(
            config.prompt_templates_path,
            Some(PathBuf::from("/etc/docsight/prompts.json"))
        );
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_with(&[("DEFAULT_MODEL", "  "), ("PORT", "")]).unwrap();
        assert_eq!(config.default_model, None);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_malformed_number_names_the_key() {
        let err = config_with(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_zero_chunk_size_fails_startup() {
        assert!(config_with(&[("CHUNK_MAX_WORDS", "0")]).is_err());
    }
}
