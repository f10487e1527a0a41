use thiserror::Error;

use crate::security::PiiRedactor;

/// Stable error codes published in `cv.failed` events.
///
/// The wire form is uppercase-with-underscores so downstream services can
/// switch on it without parsing free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    FileNotFound,
    StorageFailed,
    ParsingFailed,
    ExtractionFailed,
    ScoringFailed,
    WorkerShutdown,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
            ErrorCode::ParsingFailed => "PARSING_FAILED",
            ErrorCode::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorCode::ScoringFailed => "SCORING_FAILED",
            ErrorCode::WorkerShutdown => "WORKER_SHUTDOWN",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal, classified failure for one job: the `(code, retryable)` pair the
/// bus contract is built on, plus a human-readable message.
///
/// The message must be passed through [`PiiRedactor`] before it leaves the
/// process; [`Pipeline::run`](crate::pipeline::Pipeline::run) does this at the
/// orchestrator boundary.
#[derive(Debug, Clone)]
pub struct JobError {
    pub code: ErrorCode,
    pub retryable: bool,
    pub message: String,
}

impl JobError {
    pub fn new(code: ErrorCode, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            code,
            retryable,
            message: message.into(),
        }
    }

    /// Returns a copy with the message scrubbed of PII.
    pub fn redacted(mut self, redactor: &PiiRedactor) -> Self {
        self.message = redactor.redact(&self.message);
        self
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (retryable: {}): {}",
            self.code, self.retryable, self.message
        )
    }
}

/// Input validation failures. Always permanent: the input itself is malformed
/// or unsafe, retrying cannot fix it.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{field} is not a valid UUID")]
    InvalidIdentity { field: &'static str },

    #[error("bucket name cannot be empty")]
    EmptyBucket,

    #[error("bucket name must be 3-63 characters")]
    BucketLength,

    #[error("bucket name contains invalid characters")]
    BucketCharacters,

    #[error("file key cannot be empty")]
    EmptyKey,

    #[error("file key contains path traversal sequence")]
    PathTraversal,

    #[error("file key contains invalid characters")]
    KeyCharacters,

    #[error("file key contains invalid double slash")]
    DoubleSlash,

    #[error("file key cannot start with slash")]
    LeadingSlash,

    #[error("file size {size} bytes exceeds maximum {max_mb} MB")]
    FileTooLarge { size: u64, max_mb: u64 },

    #[error("file type '{detected}' is not allowed")]
    DisallowedType { detected: String },
}

/// Document decode failures. Permanent by default: a corrupt or encrypted
/// document will not decode better on redelivery.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to load PDF: {0}")]
    PdfLoad(String),

    #[error("document is encrypted")]
    Encrypted,

    #[error("page count {count} exceeds maximum {max}")]
    TooManyPages { count: usize, max: usize },

    #[error("failed to read DOCX: {0}")]
    Docx(String),

    #[error("no decoder for content type '{0}'")]
    UnsupportedType(String),

    #[error("document requires OCR but OCR is not available")]
    OcrUnavailable,

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("document contains no extractable text")]
    EmptyDocument,
}

/// Structured-field extraction failures. Transport problems are transient,
/// malformed collaborator responses are permanent.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("extraction request timed out after {0}s")]
    Timeout(u64),

    #[error("extraction service error: {0}")]
    Http(String),

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("extraction returned no content")]
    EmptyResponse,

    #[error("extraction is disabled: no LLM credentials configured")]
    Disabled,
}

impl ExtractError {
    pub fn retryable(&self) -> bool {
        matches!(self, ExtractError::Timeout(_) | ExtractError::Http(_))
    }
}

/// Scoring failures. Retryable by default (the scoring model is a remote
/// service), with permanent overrides for malformed payloads.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("scoring request timed out after {0}s")]
    Timeout(u64),

    #[error("scoring service error: {0}")]
    Http(String),

    #[error("malformed scoring response: {0}")]
    MalformedResponse(String),

    #[error("score {0} is outside the 0-100 range")]
    ScoreOutOfRange(i64),

    #[error("scoring is disabled: no LLM credentials configured")]
    Disabled,
}

impl ScoreError {
    pub fn retryable(&self) -> bool {
        matches!(self, ScoreError::Timeout(_) | ScoreError::Http(_))
    }
}

/// Object-store failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object '{bucket}/{key}' not found")]
    NotFound { bucket: String, key: String },

    #[error("object size {size} bytes exceeds maximum {max_bytes} bytes")]
    ObjectTooLarge { size: i64, max_bytes: u64 },

    #[error("storage request failed: {0}")]
    Request(String),
}

/// Worker-pool admission failures, reported as transient so the bus
/// redelivers the job once the pool is available again.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker pool '{0}' is shutting down")]
    ShuttingDown(&'static str),

    #[error("worker pool '{0}' dropped the task")]
    TaskLost(&'static str),
}

/// Message-bus failures.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration failures. Fatal at startup, never per-job.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Security-boundary failures. Fatal at startup, never per-job.
#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("invalid endpoint URL '{0}'")]
    InvalidUrl(String),

    #[error("endpoint scheme '{0}' not allowed, use http or https")]
    DisallowedScheme(String),

    #[error("endpoint must have a valid host")]
    MissingHost,
}

/// Top-level error for the worker binary.
#[derive(Error, Debug)]
pub enum CvParserError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

// Classification: each failure family converts into a JobError carrying the
// family default, or the variant's explicit override where the cause is known.

impl From<ValidationError> for JobError {
    fn from(e: ValidationError) -> Self {
        JobError::new(ErrorCode::ValidationFailed, false, e.to_string())
    }
}

impl From<ParseError> for JobError {
    fn from(e: ParseError) -> Self {
        JobError::new(ErrorCode::ParsingFailed, false, e.to_string())
    }
}

impl From<ExtractError> for JobError {
    fn from(e: ExtractError) -> Self {
        let retryable = e.retryable();
        JobError::new(ErrorCode::ExtractionFailed, retryable, e.to_string())
    }
}

impl From<ScoreError> for JobError {
    fn from(e: ScoreError) -> Self {
        let retryable = e.retryable();
        JobError::new(ErrorCode::ScoringFailed, retryable, e.to_string())
    }
}

impl From<StorageError> for JobError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } => {
                JobError::new(ErrorCode::FileNotFound, false, e.to_string())
            }
            // An oversized object is a bad input, not a storage fault.
            StorageError::ObjectTooLarge { .. } => {
                JobError::new(ErrorCode::ValidationFailed, false, e.to_string())
            }
            StorageError::Request(_) => {
                JobError::new(ErrorCode::StorageFailed, true, e.to_string())
            }
        }
    }
}

impl From<WorkerError> for JobError {
    fn from(e: WorkerError) -> Self {
        JobError::new(ErrorCode::WorkerShutdown, true, e.to_string())
    }
}
