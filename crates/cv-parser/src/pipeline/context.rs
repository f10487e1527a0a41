//! Per-job state accumulated as the pipeline advances.

use std::sync::Arc;

use crate::events::ParsedCvData;
use crate::llm::ScoreOutcome;
use crate::processor::DecodedDocument;
use crate::worker::JobState;

/// Stage results, filled in order. Each field is `Some` once the matching
/// stage has completed.
pub struct PipelineContext {
    pub state: JobState,
    pub bytes: Option<Arc<Vec<u8>>>,
    pub detected_mime: Option<&'static str>,
    pub document: Option<DecodedDocument>,
    pub parsed_data: Option<ParsedCvData>,
    pub score: Option<ScoreOutcome>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            state: JobState::Received,
            bytes: None,
            detected_mime: None,
            document: None,
            parsed_data: None,
            score: None,
        }
    }

    pub fn advance(&mut self, state: JobState) {
        self.state = state;
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let ctx = PipelineContext::new();
        assert_eq!(ctx.state, JobState::Received);
        assert!(ctx.bytes.is_none());
        assert!(ctx.score.is_none());
    }

    #[test]
    fn test_advance_updates_state() {
        let mut ctx = PipelineContext::new();
        ctx.advance(JobState::Validated);
        assert_eq!(ctx.state, JobState::Validated);
    }
}
