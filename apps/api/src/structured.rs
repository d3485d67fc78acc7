//! Coercion of free-form model output into a typed JSON shape.
//!
//! Models asked for JSON often wrap it in code fences or prose. `coerce` makes a
//! best effort and never fails: anything it cannot parse comes back as
//! `Coerced::Fallback` carrying the raw text.

use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    Parsed(T),
    Fallback(String),
}

pub fn coerce<T: DeserializeOwned>(raw: &str) -> Coerced<T> {
    let unfenced = strip_json_fences(raw);
    let candidate = outermost_object(unfenced).unwrap_or(unfenced);

    match serde_json::from_str(candidate) {
        Ok(value) => Coerced::Parsed(value),
        Err(e) => {
            tracing::debug!("Model output did not match expected shape: {e}");
            Coerced::Fallback(raw.to_string())
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let stripped = stripped.trim_start();
    stripped
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(stripped)
}

/// Span from the first `{` to the last `}`, inclusive.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
