//! Structural and content validation for object-store references.
//!
//! Extension- and declared-type-based checks are trivially spoofable, so the
//! only type check that carries security weight is magic-byte detection on
//! the actual file content. The declared MIME type is kept for diagnostics
//! only.

use regex::Regex;

use crate::config::FileConfig;
use crate::error::ValidationError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// How far into a ZIP container we look for DOCX entry names. DOCX local file
/// headers ([Content_Types].xml, word/...) sit at the front of the archive.
const ZIP_PROBE_BYTES: usize = 4096;

pub struct FileGuard {
    max_size_mb: u64,
    allowed_types: Vec<String>,
    traversal: Regex,
    key_charset: Regex,
    bucket_pattern: Regex,
}

impl FileGuard {
    pub fn new(config: &FileConfig) -> Self {
        // Hard-coded patterns, compilation cannot fail.
        Self {
            max_size_mb: config.max_size_mb,
            allowed_types: config.allowed_types.clone(),
            traversal: Regex::new(r"(?i)(\.\./|\.\.\\|%2e%2e%2f|%2e%2e/|\.\.%2f|%2e%2e%5c)")
                .expect("traversal pattern compiles"),
            key_charset: Regex::new(r"^[a-zA-Z0-9/_.-]+$").expect("key pattern compiles"),
            bucket_pattern: Regex::new(r"^[a-z0-9][a-z0-9.-]*[a-z0-9]$")
                .expect("bucket pattern compiles"),
        }
    }

    /// Validates an S3 bucket name: 3-63 chars, lowercase letters, digits,
    /// hyphens and dots, must start and end with a letter or digit.
    pub fn validate_bucket(&self, bucket: &str) -> Result<(), ValidationError> {
        if bucket.is_empty() {
            return Err(ValidationError::EmptyBucket);
        }
        if bucket.len() < 3 || bucket.len() > 63 {
            return Err(ValidationError::BucketLength);
        }
        if !self.bucket_pattern.is_match(bucket) {
            return Err(ValidationError::BucketCharacters);
        }
        Ok(())
    }

    /// Validates an object key for path traversal and injection attempts.
    pub fn validate_key(&self, key: &str) -> Result<(), ValidationError> {
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if self.traversal.is_match(key) {
            return Err(ValidationError::PathTraversal);
        }
        if !self.key_charset.is_match(key) {
            return Err(ValidationError::KeyCharacters);
        }
        if key.contains("//") {
            return Err(ValidationError::DoubleSlash);
        }
        if key.starts_with('/') {
            return Err(ValidationError::LeadingSlash);
        }
        Ok(())
    }

    /// Validates file content: size cap, then magic-byte detection against
    /// the allowed-type list. The declared MIME type plays no part here.
    ///
    /// Only reads the prefix detection needs; the buffer stays owned by the
    /// caller.
    pub fn validate_content(
        &self,
        bytes: &[u8],
        declared_size: u64,
    ) -> Result<&'static str, ValidationError> {
        let max_bytes = self.max_size_mb * 1024 * 1024;
        if declared_size > max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: declared_size,
                max_mb: self.max_size_mb,
            });
        }

        let detected = detect_mime(bytes);
        if !self.allowed_types.iter().any(|t| t == detected) {
            return Err(ValidationError::DisallowedType {
                detected: detected.to_string(),
            });
        }

        Ok(detected)
    }
}

/// Detects a MIME type from binary content signatures.
///
/// Covers the formats this worker routes on (PDF, DOCX) plus a few signatures
/// useful for diagnostics when rejecting spoofed uploads.
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    if bytes.len() < 4 {
        return "application/octet-stream";
    }

    if bytes.starts_with(b"%PDF") {
        return MIME_PDF;
    }

    // ZIP container: DOCX if OOXML entry names appear near the front.
    if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        let probe = &bytes[..bytes.len().min(ZIP_PROBE_BYTES)];
        if contains(probe, b"word/") || contains(probe, b"[Content_Types].xml") {
            return MIME_DOCX;
        }
        return "application/zip";
    }

    // ELF executable
    if bytes.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return "application/x-executable";
    }
    // Windows PE executable
    if bytes.starts_with(b"MZ") {
        return "application/x-msdownload";
    }
    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    // PNG: 89 50 4E 47
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }

    "application/octet-stream"
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
