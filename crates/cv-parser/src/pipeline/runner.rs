//! The processing pipeline: validate, fetch, parse, extract, score.
//!
//! `run` executes on a blocking task. CPU-bound and network-bound stages are
//! handed to their dedicated pools so one workload cannot starve another;
//! the pool `execute` call blocks this job's thread until its stage result
//! is back.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ExtractError, JobError, ParseError, ScoreError};
use crate::llm::{CvExtractor, CvScorer};
use crate::pipeline::context::PipelineContext;
use crate::processor::{DecoderRegistry, OcrEngine};
use crate::security::{FileGuard, PiiRedactor};
use crate::storage::ObjectFetcher;
use crate::worker::{Job, JobOutcome, JobState, PoolKind, WorkPoolManager};

pub struct Pipeline {
    file_guard: FileGuard,
    redactor: PiiRedactor,
    pools: Arc<WorkPoolManager>,
    storage: Arc<dyn ObjectFetcher>,
    decoders: Arc<DecoderRegistry>,
    ocr: Arc<dyn OcrEngine>,
    extractor: Option<Arc<dyn CvExtractor>>,
    scorer: Option<Arc<dyn CvScorer>>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_guard: FileGuard,
        redactor: PiiRedactor,
        pools: Arc<WorkPoolManager>,
        storage: Arc<dyn ObjectFetcher>,
        decoders: Arc<DecoderRegistry>,
        ocr: Arc<dyn OcrEngine>,
        extractor: Option<Arc<dyn CvExtractor>>,
        scorer: Option<Arc<dyn CvScorer>>,
    ) -> Self {
        Self {
            file_guard,
            redactor,
            pools,
            storage,
            decoders,
            ocr,
            extractor,
            scorer,
        }
    }

    /// Processes one job to a classified terminal result. Every failure
    /// message is redacted here, at the last point before it can reach a log
    /// line or an outbound event.
    pub fn run(&self, job: &Job) -> Result<JobOutcome, JobError> {
        let _span = tracing::info_span!(
            "pipeline",
            application_id = %job.application_id,
            attempt = job.attempt
        )
        .entered();

        match self.drive(job) {
            Ok(outcome) => {
                info!(score = outcome.ai_score, "job complete");
                Ok(outcome)
            }
            Err(e) => {
                let e = e.redacted(&self.redactor);
                warn!(code = %e.code, retryable = e.retryable, "job failed: {}", e.message);
                Err(e)
            }
        }
    }

    fn drive(&self, job: &Job) -> Result<JobOutcome, JobError> {
        let mut ctx = PipelineContext::new();

        self.step_validate(job)?;
        ctx.advance(JobState::Validated);

        ctx.bytes = Some(Arc::new(self.step_fetch(job)?));
        ctx.advance(JobState::Fetched);

        let bytes = ctx.bytes.as_ref().map(Arc::clone).unwrap_or_default();
        ctx.detected_mime = Some(self.step_check_content(job, &bytes)?);

        let mime = ctx.detected_mime.unwrap_or_default();
        ctx.document = Some(self.step_parse(mime, &bytes)?);
        ctx.advance(JobState::Parsed);

        let text = ctx
            .document
            .as_ref()
            .map(|d| d.text.clone())
            .unwrap_or_default();

        ctx.parsed_data = Some(self.step_extract(&text)?);
        ctx.advance(JobState::Extracted);

        let data = ctx.parsed_data.take().unwrap_or_default();
        ctx.score = Some(self.step_score(job, &data)?);
        ctx.advance(JobState::Scored);

        let score = ctx.score.take().ok_or_else(|| {
            JobError::new(
                crate::error::ErrorCode::Internal,
                true,
                "scoring stage produced no result",
            )
        })?;

        let reasoning = if score.reasoning.is_empty() {
            None
        } else {
            Some(score.reasoning)
        };
        Ok(JobOutcome {
            parsed_data: data,
            ai_score: score.score,
            scoring_reasoning: reasoning,
        })
    }

    fn step_validate(&self, job: &Job) -> Result<(), JobError> {
        let _span = tracing::info_span!("step.validate").entered();
        job.validate_identity()?;
        self.file_guard.validate_bucket(&job.bucket)?;
        self.file_guard.validate_key(&job.file_key)?;
        Ok(())
    }

    fn step_fetch(&self, job: &Job) -> Result<Vec<u8>, JobError> {
        let _span = tracing::info_span!("step.fetch").entered();
        let bytes = self.storage.fetch(&job.bucket, &job.file_key)?;
        Ok(bytes)
    }

    /// The content check trusts magic bytes only; the declared MIME type from
    /// the event is logged for diagnostics when they disagree.
    fn step_check_content(
        &self,
        job: &Job,
        bytes: &Arc<Vec<u8>>,
    ) -> Result<&'static str, JobError> {
        let _span = tracing::info_span!("step.check_content").entered();
        let detected = self
            .file_guard
            .validate_content(bytes, bytes.len() as u64)?;
        if job.declared_mime != detected {
            warn!(
                declared = %job.declared_mime,
                detected,
                "declared content type mismatch"
            );
        }
        Ok(detected)
    }

    fn step_parse(
        &self,
        mime: &'static str,
        bytes: &Arc<Vec<u8>>,
    ) -> Result<crate::processor::DecodedDocument, JobError> {
        let _span = tracing::info_span!("step.parse", mime).entered();

        let decoders = Arc::clone(&self.decoders);
        let task_bytes = Arc::clone(bytes);
        let mut document = self
            .pools
            .execute(PoolKind::Parsing, move || decoders.decode(mime, &task_bytes))
            .map_err(JobError::from)??;

        if document.needs_ocr {
            if !self.ocr.is_enabled() {
                return Err(ParseError::OcrUnavailable.into());
            }
            let ocr = Arc::clone(&self.ocr);
            let task_bytes = Arc::clone(bytes);
            let page_count = document.page_count;
            document.text = self
                .pools
                .execute(PoolKind::Ocr, move || {
                    ocr.recognize(&task_bytes, page_count)
                })
                .map_err(JobError::from)??;
            info!(pages = page_count, "OCR fallback used");
        }

        if document.text.trim().is_empty() {
            return Err(ParseError::EmptyDocument.into());
        }
        Ok(document)
    }

    fn step_extract(&self, text: &str) -> Result<crate::events::ParsedCvData, JobError> {
        let _span = tracing::info_span!("step.extract").entered();
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(ExtractError::Disabled)?
            .clone();
        let text = text.to_string();
        let data = self
            .pools
            .execute(PoolKind::Llm, move || extractor.extract(&text))
            .map_err(JobError::from)??;
        Ok(data)
    }

    fn step_score(
        &self,
        job: &Job,
        data: &crate::events::ParsedCvData,
    ) -> Result<crate::llm::ScoreOutcome, JobError> {
        let _span = tracing::info_span!("step.score").entered();
        let scorer = self.scorer.as_ref().ok_or(ScoreError::Disabled)?.clone();
        let job_id = job.job_id.clone();
        let data = data.clone();
        let outcome = self
            .pools
            .execute(PoolKind::Llm, move || scorer.score(&job_id, &data))
            .map_err(JobError::from)??;
        Ok(outcome)
    }
}
