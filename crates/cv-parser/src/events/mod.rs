//! Wire-format event types for the `talentflow.events` exchange.
//!
//! Field names are camelCase on the wire to match the other services on the
//! bus. The inbound payload carries a storage reference (bucket + key), never
//! a fetchable URL; files are only ever resolved through the validated
//! storage client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound event: a CV landed in object storage and needs processing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CvUploadedEvent {
    pub candidate_id: String,
    pub application_id: String,
    pub job_id: String,
    pub bucket: String,
    pub file_key: String,
    /// Declared by the uploader; advisory only, never trusted for routing.
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Outbound success event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvParsedEvent {
    pub candidate_id: String,
    pub application_id: String,
    pub job_id: String,
    pub ai_score: u8,
    pub parsed_data: ParsedCvData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_reasoning: Option<String>,
    pub parsed_at: DateTime<Utc>,
}

/// Outbound terminal-failure event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvFailedEvent {
    pub candidate_id: String,
    pub application_id: String,
    pub job_id: String,
    pub error_code: String,
    pub error_message: String,
    pub retryable: bool,
    pub failed_at: DateTime<Utc>,
}

/// Structured CV fields produced by extraction.
///
/// Every field is optional or defaultable: extraction quality varies with the
/// source document and a partially-filled result is still useful downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCvData {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub linked_in: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<String>,
}
