// Chunked Document Analyzer.
//
// Short documents are analyzed with one inference call. Longer ones are split
// into word-bounded sections, each section is analyzed in order, the section
// results are aggregated, and a final consolidation call summarizes the whole.

pub mod analyzer;
pub mod document;
pub mod error;
pub mod handlers;
pub mod report;
pub mod streaming;

pub use analyzer::{AnalysisSettings, Analyzer};
pub use document::Document;
pub use error::AnalysisError;
pub use report::AnalysisReport;
