//! OCR seam for image-only documents.
//!
//! No OCR backend ships with the worker today. The trait keeps the pipeline
//! wired for one, and [`DisabledOcr`] makes the absence an explicit,
//! classifiable failure instead of a panic or a silent empty result.

use crate::error::ParseError;

pub trait OcrEngine: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Recognizes text from the raw document bytes.
    fn recognize(&self, bytes: &[u8], page_count: usize) -> Result<String, ParseError>;
}

pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn is_enabled(&self) -> bool {
        false
    }

    fn recognize(&self, _bytes: &[u8], _page_count: usize) -> Result<String, ParseError> {
        Err(ParseError::OcrUnavailable)
    }
}
