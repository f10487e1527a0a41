//! Event-driven CV processing worker.
//!
//! Consumes `cv.uploaded` events, fetches the document from object storage,
//! validates it, decodes it to text, extracts structured candidate data and
//! scores it, then publishes exactly one terminal event per job:
//! `cv.parsed` on success or `cv.failed` with a stable error code otherwise.

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod processor;
pub mod security;
pub mod storage;
pub mod worker;

pub use error::{CvParserError, ErrorCode, JobError};
pub use pipeline::Pipeline;
pub use worker::{Job, JobOutcome, WorkPoolManager};
