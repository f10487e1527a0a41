//! End-to-end pipeline tests with stubbed storage and LLM collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use lopdf::{dictionary, Document, Object, Stream};

use cv_parser::config::{FileConfig, PoolsConfig};
use cv_parser::error::{ErrorCode, ExtractError, ScoreError, StorageError};
use cv_parser::events::ParsedCvData;
use cv_parser::llm::{CvExtractor, CvScorer, ScoreOutcome};
use cv_parser::pipeline::Pipeline;
use cv_parser::processor::{DecoderRegistry, DisabledOcr};
use cv_parser::security::{FileGuard, PiiRedactor};
use cv_parser::storage::ObjectFetcher;
use cv_parser::worker::{Job, WorkPoolManager};

const TEST_UUID: &str = "5f0c9f4e-1f37-4b26-9a1e-2a7d8f8f2b10";

struct StubStore {
    bytes: Option<Vec<u8>>,
    called: AtomicBool,
}

impl StubStore {
    fn with_object(bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            bytes: Some(bytes),
            called: AtomicBool::new(false),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            bytes: None,
            called: AtomicBool::new(false),
        })
    }
}

impl ObjectFetcher for StubStore {
    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.called.store(true, Ordering::SeqCst);
        self.bytes.clone().ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

struct StubExtractor {
    result: Result<ParsedCvData, &'static str>,
}

impl CvExtractor for StubExtractor {
    fn extract(&self, _text: &str) -> Result<ParsedCvData, ExtractError> {
        match &self.result {
            Ok(data) => Ok(data.clone()),
            Err(msg) => Err(ExtractError::MalformedResponse(msg.to_string())),
        }
    }
}

enum StubScorer {
    Fixed(u8, &'static str),
    Transient,
}

impl CvScorer for StubScorer {
    fn score(
        &self,
        _job_id: &str,
        _data: &ParsedCvData,
    ) -> Result<ScoreOutcome, ScoreError> {
        match self {
            StubScorer::Fixed(score, reasoning) => Ok(ScoreOutcome {
                score: *score,
                reasoning: reasoning.to_string(),
            }),
            StubScorer::Transient => Err(ScoreError::Timeout(30)),
        }
    }
}

fn extracted_data() -> ParsedCvData {
    ParsedCvData {
        full_name: Some("Jane Doe".into()),
        email: Some("jane@example.com".into()),
        skills: vec!["Rust".into(), "PostgreSQL".into()],
        ..Default::default()
    }
}

fn pipeline(
    store: Arc<StubStore>,
    extractor: Option<Arc<dyn CvExtractor>>,
    scorer: Option<Arc<dyn CvScorer>>,
) -> Pipeline {
    Pipeline::new(
        FileGuard::new(&FileConfig::default()),
        PiiRedactor::new(),
        Arc::new(WorkPoolManager::new(&PoolsConfig::default())),
        store,
        Arc::new(DecoderRegistry::standard(20)),
        Arc::new(DisabledOcr),
        extractor,
        scorer,
    )
}

fn job() -> Job {
    Job {
        candidate_id: TEST_UUID.into(),
        application_id: TEST_UUID.into(),
        job_id: TEST_UUID.into(),
        bucket: "talentflow-cvs".into(),
        file_key: "cvs/2026/02/resume.pdf".into(),
        declared_mime: "application/pdf".into(),
        uploaded_at: Utc::now(),
        attempt: 1,
        received_at: Utc::now(),
    }
}

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
fn test_successful_job_produces_outcome() {
    let store = StubStore::with_object(pdf_with_text("Jane Doe, Senior Rust Engineer"));
    let p = pipeline(
        store,
        Some(Arc::new(StubExtractor {
            result: Ok(extracted_data()),
        })),
        Some(Arc::new(StubScorer::Fixed(85, "strong match"))),
    );

    let outcome = p.run(&job()).unwrap();
    assert_eq!(outcome.ai_score, 85);
    assert_eq!(outcome.scoring_reasoning.as_deref(), Some("strong match"));
    assert_eq!(outcome.parsed_data.full_name.as_deref(), Some("Jane Doe"));
}

#[test]
fn test_invalid_uuid_fails_before_storage_is_touched() {
    let store = StubStore::with_object(pdf_with_text("x"));
    let p = pipeline(
        Arc::clone(&store),
        Some(Arc::new(StubExtractor {
            result: Ok(extracted_data()),
        })),
        Some(Arc::new(StubScorer::Fixed(50, "ok"))),
    );

    let mut bad = job();
    bad.candidate_id = "not-a-uuid".into();
    let err = p.run(&bad).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert!(!err.retryable);
    assert!(!store.called.load(Ordering::SeqCst));
}

#[test]
fn test_traversal_key_is_rejected() {
    let store = StubStore::with_object(pdf_with_text("x"));
    let p = pipeline(Arc::clone(&store), None, None);

    let mut bad = job();
    bad.file_key = "cvs/../secrets/payroll.pdf".into();
    let err = p.run(&bad).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert!(!err.retryable);
    assert!(!store.called.load(Ordering::SeqCst));
}

#[test]
fn test_spoofed_executable_is_rejected_despite_declared_pdf() {
    // Declared content type says PDF, bytes say Windows executable.
    let store = StubStore::with_object(b"MZ\x90\x00\x03\x00\x00\x00".to_vec());
    let p = pipeline(store, None, None);

    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert!(!err.retryable);
}

#[test]
fn test_missing_object_is_permanent_file_not_found() {
    let p = pipeline(StubStore::empty(), None, None);
    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::FileNotFound);
    assert!(!err.retryable);
}

#[test]
fn test_corrupt_pdf_is_permanent_parsing_failure() {
    let store = StubStore::with_object(b"%PDF-1.7 but the rest is garbage".to_vec());
    let p = pipeline(store, None, None);
    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::ParsingFailed);
    assert!(!err.retryable);
}

#[test]
fn test_image_only_pdf_without_ocr_fails_parsing() {
    // A structurally valid PDF with no text triggers the OCR path, which is
    // disabled.
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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

    let p = pipeline(StubStore::with_object(bytes), None, None);
    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::ParsingFailed);
    assert!(!err.retryable);
}

#[test]
fn test_disabled_extraction_is_permanent() {
    let store = StubStore::with_object(pdf_with_text("Jane Doe, Engineer"));
    let p = pipeline(store, None, None);
    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::ExtractionFailed);
    assert!(!err.retryable);
}

#[test]
fn test_scoring_timeout_is_transient() {
    let store = StubStore::with_object(pdf_with_text("Jane Doe, Engineer"));
    let p = pipeline(
        store,
        Some(Arc::new(StubExtractor {
            result: Ok(extracted_data()),
        })),
        Some(Arc::new(StubScorer::Transient)),
    );
    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::ScoringFailed);
    assert!(err.retryable);
}

#[test]
fn test_failure_messages_are_redacted() {
    let store = StubStore::with_object(pdf_with_text("Jane Doe, Engineer"));
    let p = pipeline(
        store,
        Some(Arc::new(StubExtractor {
            result: Err("unexpected token near jane.doe@example.com in response"),
        })),
        Some(Arc::new(StubScorer::Fixed(50, "ok"))),
    );
    let err = p.run(&job()).unwrap_err();
    assert_eq!(err.code, ErrorCode::ExtractionFailed);
    assert!(!err.message.contains("jane.doe@example.com"));
    assert!(err.message.contains("[EMAIL_REDACTED]"));
}
