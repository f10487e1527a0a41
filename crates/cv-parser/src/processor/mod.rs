//! Document decoding: binary content in, plain text out.

pub mod docx;
pub mod ocr;
pub mod pdf;

pub use docx::DocxDecoder;
pub use ocr::{DisabledOcr, OcrEngine};
pub use pdf::PdfDecoder;

use crate::error::ParseError;

/// Text extracted from one document.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
    pub text: String,
    pub page_count: usize,
    /// Set when the document structure decoded fine but yielded too little
    /// real text, typically a scanned PDF.
    pub needs_ocr: bool,
}

/// Decodes one document format. Implementations must be safe to call
/// concurrently from multiple pool workers.
pub trait DocumentDecoder: Send + Sync {
    fn supports(&self, mime: &str) -> bool;
    fn decode(&self, bytes: &[u8]) -> Result<DecodedDocument, ParseError>;
}

/// Routes detected MIME types to decoders.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn DocumentDecoder>>,
}

impl DecoderRegistry {
    pub fn new(decoders: Vec<Box<dyn DocumentDecoder>>) -> Self {
        Self { decoders }
    }

    /// Registry covering the formats the worker accepts.
    pub fn standard(max_pages: usize) -> Self {
        Self::new(vec![
            Box::new(PdfDecoder::new(max_pages)),
            Box::new(DocxDecoder::new()),
        ])
    }

    pub fn decode(&self, mime: &str, bytes: &[u8]) -> Result<DecodedDocument, ParseError> {
        let decoder = self
            .decoders
            .iter()
            .find(|d| d.supports(mime))
            .ok_or_else(|| ParseError::UnsupportedType(mime.to_string()))?;
        decoder.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mime_is_unsupported() {
        let registry = DecoderRegistry::standard(20);
        let result = registry.decode("image/jpeg", &[0xFF, 0xD8, 0xFF]);
        assert!(matches!(result, Err(ParseError::UnsupportedType(_))));
    }
}
