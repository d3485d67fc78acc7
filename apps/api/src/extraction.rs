//! PDF text extraction for uploaded documents.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::document::normalize_whitespace;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Uploaded file is not a PDF")]
    NotPdf,

    #[error("Could not read PDF: {0}")]
    Unreadable(String),

    #[error("PDF contains no extractable text (it may be a scanned image)")]
    NoText,
}

/// Extracts the text of every page and collapses its whitespace.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    if !looks_like_pdf(bytes) {
        return Err(ExtractionError::NotPdf);
    }

    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;

    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }

    debug!("Extracted {} characters from PDF", text.len());
    Ok(text)
}

/// Runs extraction on the blocking pool. A panic inside the PDF parser is
/// reported as `Unreadable` instead of taking the request task down.
pub async fn extract_pdf_text_blocking(bytes: Bytes) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
        .await
        .unwrap_or_else(|e| {
            warn!("PDF extraction task failed: {e}");
            Err(ExtractionError::Unreadable("parser aborted".to_string()))
        })
}

/// Leading whitespace is tolerated; some generators emit a BOM or newline first.
fn looks_like_pdf(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF)
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(PDF_MAGIC)
}
