//! Job model: one unit of CV processing derived from a `cv.uploaded` event.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::events::{CvUploadedEvent, ParsedCvData};

/// Lifecycle states a job moves through, in order. Used for logging and for
/// the pipeline context to know which stage result it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Validated,
    Fetched,
    Parsed,
    Extracted,
    Scored,
}

/// One CV-processing job.
///
/// Identity fields stay as strings: they are validated as UUIDs once at
/// admission and afterwards only ever flow back out onto the wire.
#[derive(Debug, Clone)]
pub struct Job {
    pub candidate_id: String,
    pub application_id: String,
    pub job_id: String,
    pub bucket: String,
    pub file_key: String,
    /// Declared by the uploader, used for diagnostics only.
    pub declared_mime: String,
    pub uploaded_at: DateTime<Utc>,
    /// 1-based delivery attempt, taken from broker redelivery metadata.
    pub attempt: u32,
    pub received_at: DateTime<Utc>,
}

impl Job {
    pub fn from_event(event: CvUploadedEvent, attempt: u32) -> Self {
        Self {
            candidate_id: event.candidate_id,
            application_id: event.application_id,
            job_id: event.job_id,
            bucket: event.bucket,
            file_key: event.file_key,
            declared_mime: event.mime_type,
            uploaded_at: event.uploaded_at,
            attempt,
            received_at: Utc::now(),
        }
    }

    /// Checks that every identity field is a canonical hyphenated UUID.
    ///
    /// `Uuid::parse_str` alone also accepts unhyphenated and braced forms,
    /// so the canonical shape is checked first.
    pub fn validate_identity(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("candidateId", &self.candidate_id),
            ("applicationId", &self.application_id),
            ("jobId", &self.job_id),
        ] {
            if !is_canonical_uuid(value) {
                return Err(ValidationError::InvalidIdentity { field });
            }
        }
        Ok(())
    }
}

fn is_canonical_uuid(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        let is_sep = matches!(i, 8 | 13 | 18 | 23);
        if is_sep != (*b == b'-') {
            return false;
        }
    }
    Uuid::parse_str(value).is_ok()
}

/// The successful result of a fully processed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub parsed_data: ParsedCvData,
    pub ai_score: u8,
    pub scoring_reasoning: Option<String>,
}
