//! Gemini `generateContent` client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{ExtractError, ScoreError};
use crate::events::ParsedCvData;
use crate::llm::{CvExtractor, CvScorer, ScoreOutcome};

const EXTRACTION_PROMPT: &str = "\
You are a CV parsing assistant. Extract structured data from the CV text below.
Respond with a single JSON object and nothing else, using exactly these keys:
fullName, email, phone, linkedIn, summary (strings or null), skills (array of
strings), experience (array of {title, company, startDate, endDate,
description}), education (array of {degree, institution, graduationYear}).
Omit nothing; use null or empty arrays for missing information.

CV text:
";

const SCORING_PROMPT: &str = "\
You are a recruitment assistant. Rate how strong the following candidate data
is for job posting {job_id} on a scale of 0 to 100. Respond with a
single JSON object and nothing else: {\"score\": <integer 0-100>,
\"reasoning\": \"<one or two sentences>\"}.

Candidate data:
";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: i64,
    #[serde(default)]
    reasoning: String,
}

enum CallError {
    Timeout(u64),
    Http(String),
    Empty,
}

pub struct GeminiClient {
    http: reqwest::Client,
    handle: Handle,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig, handle: Handle) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            handle,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    /// One `generateContent` round trip. Blocks the calling pool thread;
    /// the future runs on the shared runtime.
    fn generate(&self, prompt: String) -> Result<String, CallError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json".into(),
            },
        };

        let request = async {
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| CallError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CallError::Http(format!("status {}", status)));
            }

            response
                .json::<GenerateResponse>()
                .await
                .map_err(|e| CallError::Http(e.to_string()))
        };

        let response = self
            .handle
            .block_on(tokio::time::timeout(self.timeout, request))
            .map_err(|_| CallError::Timeout(self.timeout.as_secs()))??;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CallError::Empty);
        }
        Ok(text)
    }
}

impl CvExtractor for GeminiClient {
    fn extract(&self, text: &str) -> Result<ParsedCvData, ExtractError> {
        let _span = tracing::info_span!("llm.extract").entered();

        let raw = self
            .generate(format!("{}{}", EXTRACTION_PROMPT, text))
            .map_err(|e| match e {
                CallError::Timeout(secs) => ExtractError::Timeout(secs),
                CallError::Http(msg) => ExtractError::Http(msg),
                CallError::Empty => ExtractError::EmptyResponse,
            })?;

        let json = strip_code_fences(&raw);
        let data: ParsedCvData = serde_json::from_str(json)
            .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;

        debug!(
            skills = data.skills.len(),
            experience = data.experience.len(),
            "extraction complete"
        );
        Ok(data)
    }
}

impl CvScorer for GeminiClient {
    fn score(
        &self,
        job_id: &str,
        data: &ParsedCvData,
    ) -> Result<ScoreOutcome, ScoreError> {
        let _span = tracing::info_span!("llm.score").entered();

        let candidate_json =
            serde_json::to_string(data).map_err(|e| ScoreError::MalformedResponse(e.to_string()))?;
        let prompt = format!(
            "{}{}",
            SCORING_PROMPT.replace("{job_id}", job_id),
            candidate_json
        );

        let raw = self.generate(prompt).map_err(|e| match e {
            CallError::Timeout(secs) => ScoreError::Timeout(secs),
            CallError::Http(msg) => ScoreError::Http(msg),
            CallError::Empty => ScoreError::MalformedResponse("empty response".into()),
        })?;

        let json = strip_code_fences(&raw);
        let parsed: ScoreResponse = serde_json::from_str(json)
            .map_err(|e| ScoreError::MalformedResponse(e.to_string()))?;

        if !(0..=100).contains(&parsed.score) {
            return Err(ScoreError::ScoreOutOfRange(parsed.score));
        }

        Ok(ScoreOutcome {
            score: parsed.score as u8,
            reasoning: parsed.reasoning,
        })
    }
}

/// Models sometimes wrap JSON in markdown fences despite the response MIME
/// type hint.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_score_response_parses() {
        let parsed: ScoreResponse =
            serde_json::from_str(r#"{"score": 85, "reasoning": "strong match"}"#).unwrap();
        assert_eq!(parsed.score, 85);
        assert_eq!(parsed.reasoning, "strong match");
    }

    #[test]
    fn test_score_response_without_reasoning() {
        let parsed: ScoreResponse = serde_json::from_str(r#"{"score": 40}"#).unwrap();
        assert_eq!(parsed.reasoning, "");
    }

    #[test]
    fn test_client_absent_without_key() {
        let config = LlmConfig::default();
        // Handle is only needed when a key is present.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert!(GeminiClient::from_config(&config, runtime.handle().clone()).is_none());
    }
}
