// Resume Review: one structured generate call whose JSON answer is coerced
// into `ResumeReview`, with a placeholder review when the model ignores the
// requested shape.

pub mod handlers;

use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis::document::truncate_chars;
use crate::structured::{coerce, Coerced};

pub const MAX_RATING: f32 = 10.0;

/// Characters of raw model output kept in a fallback summary.
const FALLBACK_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeReview {
    #[serde(deserialize_with = "lenient_rating")]
    pub overall_rating: f32,
    #[serde(default)]
    pub rating_explanation: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
    #[serde(default)]
    pub specific_suggestions: Vec<String>,
    #[serde(default)]
    pub keywords_missing: Vec<String>,
    #[serde(default)]
    pub format_feedback: String,
    #[serde(default)]
    pub summary: String,
}

/// Review plus whether it came from the model's JSON or the placeholder.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub review: ResumeReview,
    pub parsed: bool,
}

impl ResumeReview {
    /// Placeholder review used when the model's answer is not valid JSON.
    /// The summary keeps the start of what the model did say.
    pub fn fallback(raw: &str) -> Self {
        let summary = format!(
            "{}...",
            truncate_chars(raw.trim(), FALLBACK_SUMMARY_CHARS)
        );
        Self {
            overall_rating: 7.0,
            rating_explanation: "Analysis completed with basic evaluation".to_string(),
            strengths: strings(&[
                "Professional experience shown",
                "Educational background included",
                "Contact information provided",
            ]),
            areas_for_improvement: strings(&[
                "Add more quantified achievements",
                "Include relevant keywords",
                "Improve formatting consistency",
                "Add skills section",
                "Enhance summary section",
            ]),
            specific_suggestions: strings(&[
                "Use bullet points for achievements",
                "Add metrics to demonstrate impact",
                "Include industry-specific keywords",
            ]),
            keywords_missing: strings(&[
                "Industry-specific terms",
                "Technical skills",
                "Soft skills",
            ]),
            format_feedback: "Consider improving overall structure and visual appeal".to_string(),
            summary,
        }
    }

    /// Parses model output, falling back to the placeholder review.
    pub fn from_model_output(raw: &str) -> ReviewOutcome {
        match coerce::<ResumeReview>(raw) {
            Coerced::Parsed(review) => ReviewOutcome {
                review: review.clamped(),
                parsed: true,
            },
            Coerced::Fallback(raw) => ReviewOutcome {
                review: Self::fallback(&raw),
                parsed: false,
            },
        }
    }

    pub fn clamped(mut self) -> Self {
        self.overall_rating = if self.overall_rating.is_finite() {
            self.overall_rating.clamp(0.0, MAX_RATING)
        } else {
            0.0
        };
        self
    }

    /// Plain-text report suitable for download.
    pub fn to_report_text(&self) -> String {
        let bullets = |items: &[String]| {
            items
                .iter()
                .map(|item| format!("• {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let numbered = self
            .specific_suggestions
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "RESUME ANALYSIS REPORT\n\
             =====================\n\
             \n\
             Overall Rating: {rating}/10\n\
             {explanation}\n\
             \n\
             STRENGTHS:\n{strengths}\n\
             \n\
             AREAS FOR IMPROVEMENT:\n{improvements}\n\
             \n\
             SPECIFIC SUGGESTIONS:\n{numbered}\n\
             \n\
             MISSING KEYWORDS:\n{keywords}\n\
             \n\
             FORMAT FEEDBACK:\n{format}\n\
             \n\
             SUMMARY:\n{summary}\n",
            rating = self.overall_rating,
            explanation = self.rating_explanation,
            strengths = bullets(&self.strengths),
            improvements = bullets(&self.areas_for_improvement),
            keywords = bullets(&self.keywords_missing),
            format = self.format_feedback,
            summary = self.summary,
        )
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Accepts `8`, `8.5`, `"8"` or `"8/10"`.
fn lenient_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rating {
        Number(f32),
        Text(String),
    }

    match Rating::deserialize(deserializer)? {
        Rating::Number(n) => Ok(n),
        Rating::Text(text) => text
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid rating '{text}'"))),
    }
}
