//! Scenario tests for the ingestion pipeline, answer paths, and the
//! streaming protocol, using in-process fakes for every collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;

use pdfrag::{
    ChatOptions, CompletionModel, EmbeddingProvider, ExtractedDocument, IngestStatus,
    InMemoryVectorStore, Language, RagConfig, RagError, RagPipeline, Result, StreamEvent,
    TextExtractor, TokenStream, VectorStore,
};

// ── Fakes ──────────────────────────────────────────────────────────

/// Extractor returning a fixed set of pages, counting its invocations.
struct FakeExtractor {
    pages: Vec<String>,
    warnings: Vec<String>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            warnings: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl TextExtractor for FakeExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<ExtractedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractedDocument { pages: self.pages.clone(), warnings: self.warnings.clone() })
    }
}

/// Deterministic embedder: a small vector derived from the text bytes.
struct HashEmbedder {
    fail: bool,
}

impl HashEmbedder {
    fn new() -> Self {
        Self { fail: false }
    }

    fn failing() -> Self {
        Self { fail: true }
    }
}

fn embed_bytes(text: &str) -> Vec<f32> {
    let mut v = [1.0f32; 4];
    for (i, b) in text.bytes().enumerate() {
        v[i % 4] += b as f32;
    }
    v.to_vec()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(RagError::Embedding {
                provider: "fake".to_string(),
                message: "embedding backend exploded".to_string(),
            });
        }
        Ok(embed_bytes(text))
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Completion model returning a fixed answer, with a scripted token stream.
struct ScriptedModel {
    answer: String,
    fragments: Vec<Result<String>>,
    called: AtomicBool,
}

impl ScriptedModel {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fragments: answer.split_inclusive(' ').map(|f| Ok(f.to_string())).collect(),
            called: AtomicBool::new(false),
        }
    }

    fn with_fragments(fragments: Vec<Result<String>>) -> Self {
        Self { answer: String::new(), fragments, called: AtomicBool::new(false) }
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.called.store(true, Ordering::SeqCst);
        Ok(self.answer.clone())
    }

    async fn complete_stream(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<TokenStream> {
        self.called.store(true, Ordering::SeqCst);
        let fragments: Vec<Result<String>> = self
            .fragments
            .iter()
            .map(|f| match f {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(RagError::Generation {
                    backend: "fake".to_string(),
                    message: e.to_string(),
                }),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

/// A store whose reachability probe always fails.
struct UnreachableStore;

#[async_trait]
impl VectorStore for UnreachableStore {
    async fn upsert(&self, _records: &[pdfrag::IndexedRecord]) -> Result<()> {
        panic!("store must not be touched when unreachable");
    }

    async fn query(
        &self,
        _embedding: &[f32],
        _top_k: usize,
        _doc_id: Option<&str>,
    ) -> Result<Vec<pdfrag::QueryHit>> {
        panic!("store must not be touched when unreachable");
    }

    async fn delete_document(&self, _doc_id: &str) -> Result<()> {
        panic!("store must not be touched when unreachable");
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }

    async fn reachable(&self) -> bool {
        false
    }
}

// ── Helpers ────────────────────────────────────────────────────────

struct Harness {
    pipeline: Arc<RagPipeline>,
    extractor: Arc<FakeExtractor>,
    store: Arc<InMemoryVectorStore>,
    model: Arc<ScriptedModel>,
}

fn harness(config: RagConfig, extractor: FakeExtractor, model: ScriptedModel) -> Harness {
    let extractor = Arc::new(extractor);
    let store = Arc::new(InMemoryVectorStore::new());
    let model = Arc::new(model);
    let pipeline = Arc::new(
        RagPipeline::builder()
            .config(config)
            .extractor(Arc::clone(&extractor) as Arc<dyn TextExtractor>)
            .embedder(Arc::new(HashEmbedder::new()))
            .store(Arc::clone(&store) as Arc<dyn VectorStore>)
            .model(Arc::clone(&model) as Arc<dyn CompletionModel>)
            .build()
            .unwrap(),
    );
    Harness { pipeline, extractor, store, model }
}

fn small_config() -> RagConfig {
    RagConfig::builder().chunk_size(50).chunk_overlap(10).top_k(5).build().unwrap()
}

// ── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_indexes_chunks_per_page() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["first page text", "second page text"]),
        ScriptedModel::new("ok"),
    );

    let report = h.pipeline.ingest(b"%PDF-", "report.pdf").await.unwrap();
    assert_eq!(report.status, IngestStatus::Indexed);
    assert_eq!(report.pages, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.collection, "pdf_chatbot");
    assert!(report.warnings.is_empty());
    assert_eq!(h.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn ingest_skips_document_with_all_blank_pages() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["   ", "\n\t"]),
        ScriptedModel::new("ok"),
    );

    let report = h.pipeline.ingest(b"%PDF-", "scan.pdf").await.unwrap();
    assert_eq!(report.status, IngestStatus::Skipped);
    assert_eq!(report.chunks, 0);
    assert!(report.warnings.iter().any(|w| w.contains("no extractable text")));
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn blank_pages_warn_but_do_not_abort() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["content here", "   ", "more content"]),
        ScriptedModel::new("ok"),
    );

    let report = h.pipeline.ingest(b"%PDF-", "mixed.pdf").await.unwrap();
    assert_eq!(report.status, IngestStatus::Indexed);
    assert_eq!(report.pages, 3);
    assert!(report.warnings.iter().any(|w| w.contains("page 2")));
}

#[tokio::test]
async fn ingest_rejects_non_pdf_before_any_work() {
    let h = harness(small_config(), FakeExtractor::pages(&["text"]), ScriptedModel::new("ok"));

    let err = h.pipeline.ingest(b"data", "notes.txt").await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ingest_rejects_oversized_upload() {
    let config = RagConfig::builder().max_upload_bytes(8).build().unwrap();
    let h = harness(config, FakeExtractor::pages(&["text"]), ScriptedModel::new("ok"));

    let err = h.pipeline.ingest(b"123456789", "big.pdf").await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ingest_rejects_when_store_unreachable() {
    let extractor = Arc::new(FakeExtractor::pages(&["text"]));
    let pipeline = RagPipeline::builder()
        .extractor(Arc::clone(&extractor) as Arc<dyn TextExtractor>)
        .embedder(Arc::new(HashEmbedder::new()))
        .store(Arc::new(UnreachableStore))
        .model(Arc::new(ScriptedModel::new("ok")))
        .build()
        .unwrap();

    let err = pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap_err();
    assert!(matches!(err, RagError::DependencyUnavailable { .. }));
    // Rejected before extraction.
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chunk_ceiling_aborts_without_index_writes() {
    let config = RagConfig::builder()
        .chunk_size(10)
        .chunk_overlap(0)
        .max_chunks_per_ingest(3)
        .build()
        .unwrap();
    let long_page = "0123456789".repeat(10); // 10 chunks
    let h = harness(config, FakeExtractor::pages(&[&long_page]), ScriptedModel::new("ok"));

    let err = h.pipeline.ingest(b"%PDF-", "huge.pdf").await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert!(err.to_string().contains("limit"));
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn chunk_count_at_the_ceiling_is_accepted() {
    let config = RagConfig::builder()
        .chunk_size(10)
        .chunk_overlap(0)
        .max_chunks_per_ingest(3)
        .build()
        .unwrap();
    let page = "0123456789".repeat(3); // exactly 3 chunks
    let h = harness(config, FakeExtractor::pages(&[&page]), ScriptedModel::new("ok"));

    let report = h.pipeline.ingest(b"%PDF-", "fits.pdf").await.unwrap();
    assert_eq!(report.chunks, 3);
}

#[tokio::test]
async fn embedding_failure_leaves_index_unchanged() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = RagPipeline::builder()
        .config(small_config())
        .extractor(Arc::new(FakeExtractor::pages(&["some page text"])))
        .embedder(Arc::new(HashEmbedder::failing()))
        .store(Arc::clone(&store) as Arc<dyn VectorStore>)
        .model(Arc::new(ScriptedModel::new("ok")))
        .build()
        .unwrap();

    let err = pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_document_removes_only_that_document() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["shared page text"]),
        ScriptedModel::new("ok"),
    );

    let first = h.pipeline.ingest(b"%PDF-", "a.pdf").await.unwrap();
    let second = h.pipeline.ingest(b"%PDF-", "b.pdf").await.unwrap();
    assert_ne!(first.doc_id, second.doc_id);
    assert_eq!(h.store.count().await.unwrap(), 2);

    h.pipeline.delete_document(&first.doc_id).await.unwrap();
    assert_eq!(h.pipeline.chunk_count().await.unwrap(), 1);

    let hits =
        h.pipeline.retrieve("shared page text", Some(second.doc_id.as_str()), 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    let hits = h.pipeline.retrieve("shared page text", Some(first.doc_id.as_str()), 5).await.unwrap();
    assert!(hits.is_empty());
}

// ── Non-streaming answers ──────────────────────────────────────────

#[tokio::test]
async fn question_against_empty_index_returns_fallback() {
    let h = harness(small_config(), FakeExtractor::pages(&[]), ScriptedModel::new("ok"));

    let answer = h.pipeline.answer("anything?", &ChatOptions::default()).await.unwrap();
    assert_eq!(answer.answer, Language::En.fallback_answer());
    assert!(answer.citations.is_empty());
    assert_eq!(answer.used_chunks, 0);
    // The generation service is never called without context.
    assert!(!h.model.called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn answer_carries_citations_for_retrieved_chunks() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["the total is 42 euros"]),
        ScriptedModel::new("  42 euros.  "),
    );
    h.pipeline.ingest(b"%PDF-", "invoice.pdf").await.unwrap();

    let answer = h.pipeline.answer("what is the total?", &ChatOptions::default()).await.unwrap();
    assert_eq!(answer.answer, "42 euros.");
    assert_eq!(answer.used_chunks, 1);
    assert_eq!(answer.citations.len(), 1);
    let citation = &answer.citations[0];
    assert_eq!(citation.filename, "invoice.pdf");
    assert_eq!(citation.page, 1);
    assert!(citation.score > 0.0 && citation.score <= 1.0);
    assert!(citation.excerpt.contains("42 euros"));
    assert!(answer.context_preview.is_none());
}

#[tokio::test]
async fn blank_generated_answer_becomes_fallback() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["page text"]),
        ScriptedModel::new("   \n  "),
    );
    h.pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap();

    let opts = ChatOptions { language: Language::De, ..ChatOptions::default() };
    let answer = h.pipeline.answer("frage?", &opts).await.unwrap();
    assert_eq!(answer.answer, "Nicht im Dokument.");
    assert_eq!(answer.used_chunks, 1);
}

#[tokio::test]
async fn context_preview_is_returned_on_request() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["page text"]),
        ScriptedModel::new("answer"),
    );
    h.pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap();

    let opts = ChatOptions { return_context: true, ..ChatOptions::default() };
    let answer = h.pipeline.answer("question?", &opts).await.unwrap();
    assert_eq!(answer.context_preview.as_deref(), Some("page text"));
}

#[tokio::test]
async fn empty_question_and_hybrid_mode_are_rejected() {
    let h = harness(small_config(), FakeExtractor::pages(&[]), ScriptedModel::new("ok"));

    let err = h.pipeline.answer("  ", &ChatOptions::default()).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));

    let opts = ChatOptions { mode: pdfrag::RetrievalMode::Hybrid, ..ChatOptions::default() };
    let err = h.pipeline.answer("question?", &opts).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
}

// ── Streaming protocol ─────────────────────────────────────────────

async fn collect(stream: pdfrag::AnswerStream) -> Vec<StreamEvent> {
    stream.collect().await
}

#[tokio::test]
async fn stream_emits_meta_tokens_done_in_order() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["alpha beta gamma"]),
        ScriptedModel::new("alpha beta"),
    );
    h.pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap();

    let events =
        collect(Arc::clone(&h.pipeline).answer_stream("alpha?".into(), ChatOptions::default()))
            .await;

    assert!(matches!(events.first(), Some(StreamEvent::Meta { used_chunks: 1, .. })));
    assert!(matches!(events.last(), Some(StreamEvent::Done)));
    let tokens: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens.concat(), "alpha beta");
    // Exactly one terminal event, and it is last.
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn stream_against_empty_index_skips_generation() {
    let h = harness(small_config(), FakeExtractor::pages(&[]), ScriptedModel::new("unused"));

    let events =
        collect(Arc::clone(&h.pipeline).answer_stream("anything?".into(), ChatOptions::default()))
            .await;

    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        StreamEvent::Meta { citations, used_chunks: 0, .. } if citations.is_empty()
    ));
    assert!(matches!(
        &events[1],
        StreamEvent::Token { content } if content.as_str() == Language::En.fallback_answer()
    ));
    assert!(matches!(events[2], StreamEvent::Done));
    assert!(!h.model.called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stream_converts_mid_generation_failure_to_terminal_error() {
    let model = ScriptedModel::with_fragments(vec![
        Ok("partial ".to_string()),
        Err(RagError::Generation {
            backend: "fake".to_string(),
            message: "connection reset".to_string(),
        }),
    ]);
    let h = harness(small_config(), FakeExtractor::pages(&["page text"]), model);
    h.pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap();

    let events =
        collect(Arc::clone(&h.pipeline).answer_stream("question?".into(), ChatOptions::default()))
            .await;

    assert!(matches!(events.first(), Some(StreamEvent::Meta { .. })));
    assert!(matches!(&events[1], StreamEvent::Token { content } if content.as_str() == "partial "));
    assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Done)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn stream_rejects_bad_request_with_single_error_event() {
    let h = harness(small_config(), FakeExtractor::pages(&[]), ScriptedModel::new("ok"));

    let events =
        collect(Arc::clone(&h.pipeline).answer_stream("   ".into(), ChatOptions::default())).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error { detail } if detail.contains("question")));
}

#[tokio::test]
async fn dropping_the_stream_stops_consumption() {
    let h = harness(
        small_config(),
        FakeExtractor::pages(&["page text"]),
        ScriptedModel::new("one two three four"),
    );
    h.pipeline.ingest(b"%PDF-", "doc.pdf").await.unwrap();

    let mut events =
        Arc::clone(&h.pipeline).answer_stream("question?".into(), ChatOptions::default());
    // Consume only the meta event, then drop: no panic, no hang.
    let first = events.next().await;
    assert!(matches!(first, Some(StreamEvent::Meta { .. })));
    drop(events);
}
