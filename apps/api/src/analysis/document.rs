//! Document normalization and word-count chunking.

use serde::Serialize;

use crate::analysis::error::AnalysisError;

/// Extracted document text with whitespace collapsed. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    text: String,
    word_count: usize,
}

impl Document {
    /// Normalizes `raw` and rejects documents with no words.
    pub fn new(raw: &str) -> Result<Self, AnalysisError> {
        let text = normalize_whitespace(raw);
        if text.is_empty() {
            return Err(AnalysisError::EmptyDocument);
        }
        let word_count = text.split(' ').count();
        Ok(Self { text, word_count })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn chunks(&self, max_words: usize) -> Vec<Chunk> {
        split_into_chunks(&self.text, max_words)
    }
}

/// A contiguous run of at most `max_words` words, numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

/// Collapses every run of whitespace (including newlines) to one space and trims.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits on whitespace into chunks of exactly `max_words` words, except the
/// last, which holds the remainder. `max_words` of 0 is treated as 1.
pub fn split_into_chunks(text: &str, max_words: usize) -> Vec<Chunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .enumerate()
        .map(|(i, group)| Chunk {
            index: i + 1,
            text: group.join(" "),
            word_count: group.len(),
        })
        .collect()
}

/// Longest prefix of `text` with at most `max_chars` characters.
/// Cuts on a char boundary, never inside a multi-byte sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
