use tracing::debug;

use crate::error::ParseError;
use crate::processor::{DecodedDocument, DocumentDecoder};
use crate::security::MIME_PDF;

/// Marker lopdf emits for CID fonts it cannot map (common in generated CVs).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is accepted regardless of character composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Below this alphanumeric percentage the extracted text counts as garbled.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

pub struct PdfDecoder {
    max_pages: usize,
}

impl PdfDecoder {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }
}

impl DocumentDecoder for PdfDecoder {
    fn supports(&self, mime: &str) -> bool {
        mime == MIME_PDF
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedDocument, ParseError> {
        let _span = tracing::info_span!("decode.pdf").entered();

        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ParseError::PdfLoad(e.to_string()))?;

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(ParseError::Encrypted);
        }

        let pages = doc.get_pages();
        let page_count = pages.len();
        if page_count > self.max_pages {
            return Err(ParseError::TooManyPages {
                count: page_count,
                max: self.max_pages,
            });
        }

        let mut text = String::new();
        for (page_num, _) in pages {
            if let Ok(page_text) = doc.extract_text(&[page_num]) {
                text.push_str(&page_text);
                text.push('\n');
            }
        }

        let needs_ocr = is_garbled(&text);
        if needs_ocr {
            debug!(page_count, "extracted text unusable, flagging for OCR");
        }

        Ok(DecodedDocument {
            text,
            page_count,
            needs_ocr,
        })
    }
}

/// Decides whether extracted text is usable or the document is effectively
/// image-only. True when the text is empty, consists only of font-encoding
/// error markers, or has a very low alphanumeric ratio.
fn is_garbled(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    // chars().count(), not len(): CVs are frequently non-ASCII.
    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};

    fn pdf_with_text(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            }),
        );
        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            }),
        );
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_supports_only_pdf() {
        let decoder = PdfDecoder::new(20);
        assert!(decoder.supports(MIME_PDF));
        assert!(!decoder.supports("application/zip"));
    }

    #[test]
    fn test_decodes_embedded_text() {
        let bytes = pdf_with_text("Senior Rust Engineer");
        let doc = PdfDecoder::new(20).decode(&bytes).unwrap();
        assert!(doc.text.contains("Senior Rust Engineer"));
        assert_eq!(doc.page_count, 1);
        assert!(!doc.needs_ocr);
    }

    #[test]
    fn test_corrupt_pdf_fails_to_load() {
        let result = PdfDecoder::new(20).decode(b"not a valid pdf");
        assert!(matches!(result, Err(ParseError::PdfLoad(_))));
    }

    #[test]
    fn test_page_limit_enforced() {
        let bytes = pdf_with_text("one page");
        let result = PdfDecoder::new(0).decode(&bytes);
        assert!(matches!(
            result,
            Err(ParseError::TooManyPages { count: 1, max: 0 })
        ));
    }

    #[test]
    fn test_garbled_empty_and_whitespace() {
        assert!(is_garbled(""));
        assert!(is_garbled("   \n\t  "));
    }

    #[test]
    fn test_garbled_identity_h_only() {
        let text = "?Identity-H Unimplemented?\n?Identity-H Unimplemented?";
        assert!(is_garbled(text));
    }

    #[test]
    fn test_identity_h_mixed_with_content_is_usable() {
        let text = "Jane Doe ?Identity-H Unimplemented? Senior Engineer at Example Corp";
        assert!(!is_garbled(text));
    }

    #[test]
    fn test_garbled_low_alphanumeric_ratio() {
        let garbled = "!@#$%".repeat(12);
        assert!(garbled.chars().count() > MIN_TOTAL_CHARS);
        assert!(is_garbled(&garbled));
    }

    #[test]
    fn test_short_symbol_runs_are_accepted() {
        // Below the length threshold the ratio check does not apply.
        assert!(!is_garbled("!@#$%"));
    }

    #[test]
    fn test_normal_text_is_usable() {
        assert!(!is_garbled(
            "Experienced backend developer with ten years of Rust and Go"
        ));
    }
}
