//! Security boundaries: file validation, endpoint allowlisting, PII
//! redaction.

pub mod endpoint;
pub mod file;
pub mod redact;

pub use endpoint::EndpointGuard;
pub use file::{detect_mime, FileGuard, MIME_DOCX, MIME_PDF};
pub use redact::PiiRedactor;
