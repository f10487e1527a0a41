use std::io::{Cursor, Read};

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;
use crate::processor::{DecodedDocument, DocumentDecoder};
use crate::security::MIME_DOCX;

pub struct DocxDecoder;

impl DocxDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDecoder for DocxDecoder {
    fn supports(&self, mime: &str) -> bool {
        mime == MIME_DOCX
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedDocument, ParseError> {
        let _span = tracing::info_span!("decode.docx").entered();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ParseError::Docx(format!("failed to open archive: {}", e)))?;

        let mut document_xml = archive
            .by_name("word/document.xml")
            .map_err(|e| ParseError::Docx(format!("missing document.xml: {}", e)))?;

        let mut xml_content = String::new();
        document_xml
            .read_to_string(&mut xml_content)
            .map_err(|e| ParseError::Docx(format!("failed to read document.xml: {}", e)))?;

        let text = extract_paragraphs(&xml_content)?;

        // DOCX has no fixed pages; a paragraph count stands in for sizing
        // purposes and OCR never applies.
        Ok(DecodedDocument {
            text,
            page_count: 1,
            needs_ocr: false,
        })
    }
}

/// Walks the WordprocessingML body collecting `w:t` runs, with a newline per
/// closed `w:p` paragraph.
///
/// Text is left untrimmed: `w:t` runs carry significant leading and trailing
/// whitespace ("Hello " + "world"), and runs outside `w:t` are never
/// collected anyway.
fn extract_paragraphs(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_run = false;
    let mut in_paragraph = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = true,
                b"p" => in_paragraph = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if in_paragraph {
                        text.push('\n');
                        in_paragraph = false;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_run {
                    let raw = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|err| ParseError::Docx(format!("text decode error: {}", err)))?;
                    // decode() resolves the encoding only; entity references
                    // still need unescaping.
                    match unescape(&raw) {
                        Ok(resolved) => text.push_str(&resolved),
                        Err(_) => text.push_str(&raw),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Docx(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body_xml: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{}</w:body></w:document>"#,
            body_xml
        );
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_supports_only_docx() {
        let decoder = DocxDecoder::new();
        assert!(decoder.supports(MIME_DOCX));
        assert!(!decoder.supports("application/pdf"));
    }

    #[test]
    fn test_extracts_paragraph_text() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Rust Developer</w:t></w:r></w:p>",
        );
        let doc = DocxDecoder::new().decode(&bytes).unwrap();
        assert_eq!(doc.text, "Jane Doe\nRust Developer\n");
        assert!(!doc.needs_ocr);
    }

    #[test]
    fn test_joins_runs_within_paragraph() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>",
        );
        let doc = DocxDecoder::new().decode(&bytes).unwrap();
        assert_eq!(doc.text.trim(), "Hello world");
    }

    #[test]
    fn test_unescapes_entities() {
        let bytes = docx_with_body("<w:p><w:r><w:t>C&amp;D Consulting</w:t></w:r></w:p>");
        let doc = DocxDecoder::new().decode(&bytes).unwrap();
        assert!(doc.text.contains("C&D Consulting"));
    }

    #[test]
    fn test_not_a_zip_fails() {
        let result = DocxDecoder::new().decode(b"plain text, not an archive");
        assert!(matches!(result, Err(ParseError::Docx(_))));
    }

    #[test]
    fn test_zip_without_document_xml_fails() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("other.txt", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"hello").unwrap();
            writer.finish().unwrap();
        }
        let result = DocxDecoder::new().decode(&buffer.into_inner());
        assert!(matches!(result, Err(ParseError::Docx(_))));
    }
}
