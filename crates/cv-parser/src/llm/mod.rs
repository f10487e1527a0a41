//! Structured extraction and scoring seams.
//!
//! The pipeline talks to traits so tests can run without network access;
//! [`gemini::GeminiClient`] is the production implementation of both.

pub mod gemini;

pub use gemini::GeminiClient;

use crate::error::{ExtractError, ScoreError};
use crate::events::ParsedCvData;

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub score: u8,
    pub reasoning: String,
}

/// Turns raw CV text into structured fields.
pub trait CvExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<ParsedCvData, ExtractError>;
}

/// Scores extracted CV data against a job posting.
pub trait CvScorer: Send + Sync {
    fn score(&self, job_id: &str, data: &ParsedCvData)
        -> Result<ScoreOutcome, ScoreError>;
}
