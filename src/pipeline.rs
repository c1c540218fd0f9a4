//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (extract → chunk → embed →
//! index) and question answering (embed → retrieve → assemble → generate)
//! by composing a [`TextExtractor`], an [`EmbeddingProvider`], a
//! [`VectorStore`], and a [`CompletionModel`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfrag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = Arc::new(
//!     RagPipeline::builder()
//!         .config(RagConfig::default())
//!         .extractor(Arc::new(my_extractor))
//!         .embedder(Arc::new(my_embedder))
//!         .store(Arc::new(InMemoryVectorStore::new()))
//!         .model(Arc::new(my_model))
//!         .build()?,
//! );
//!
//! let report = pipeline.ingest(&bytes, "report.pdf").await?;
//! let answer = pipeline.answer("What does it say?", &ChatOptions::default()).await?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::StreamExt;
use tracing::{error, info};
use uuid::Uuid;

use crate::chunking::chunk_text;
use crate::config::{MAX_TOP_K, RagConfig};
use crate::document::{
    ChatAnswer, ChatOptions, ChunkMetadata, IndexedRecord, IngestReport, IngestStatus, QueryHit,
    RetrievalMode, chunk_id,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::TextExtractor;
use crate::generation::CompletionModel;
use crate::retrieval::{assemble_context, build_citations, build_prompt};
use crate::stream::{AnswerStream, StreamEvent};
use crate::vectorstore::VectorStore;

/// Characters of assembled context included in a preview.
const CONTEXT_PREVIEW_CHARS: usize = 500;

/// The pipeline orchestrator. Construct one via [`RagPipeline::builder()`].
///
/// Each request runs its steps sequentially; independent requests run
/// concurrently and share nothing but the injected collaborators, which are
/// thread-safe by contract.
pub struct RagPipeline {
    config: RagConfig,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn CompletionModel>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Reject the request if the vector index or embedding model is not ready.
    async fn ensure_dependencies(&self) -> Result<()> {
        if !self.store.reachable().await {
            return Err(RagError::DependencyUnavailable {
                dependency: "vector index".to_string(),
                message: "vector index is not reachable".to_string(),
            });
        }
        if !self.embedder.is_ready() {
            return Err(RagError::DependencyUnavailable {
                dependency: "embedding model".to_string(),
                message: "embedding model is not loaded yet".to_string(),
            });
        }
        Ok(())
    }

    /// Ingest one document: validate → extract → chunk → embed → index.
    ///
    /// All-or-nothing: any failure after validation aborts without partial
    /// index writes. A document with no extractable text returns a
    /// [`Skipped`](IngestStatus::Skipped) report instead of an error.
    ///
    /// A document whose chunk count exceeds `max_chunks_per_ingest` is
    /// rejected outright; nothing is indexed.
    pub async fn ingest(&self, bytes: &[u8], filename: &str) -> Result<IngestReport> {
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(RagError::Validation(format!(
                "unsupported file type for '{filename}': only PDF files are accepted"
            )));
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(RagError::Validation(format!(
                "file is too large ({} bytes, maximum {} bytes)",
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        self.ensure_dependencies().await?;

        let started = Instant::now();
        let doc_id = Uuid::new_v4().simple().to_string();

        let extracted = self.extractor.extract(bytes).map_err(|e| {
            error!(filename, error = %e, "extraction failed");
            e
        })?;
        let mut warnings = extracted.warnings;

        if extracted.pages.iter().all(|p| p.trim().is_empty()) {
            warnings.insert(
                0,
                "no extractable text found (possibly a scanned document)".to_string(),
            );
            info!(document.id = %doc_id, filename, "ingestion skipped, no extractable text");
            return Ok(IngestReport {
                doc_id,
                filename: filename.to_string(),
                bytes: bytes.len(),
                pages: 0,
                chunks: 0,
                collection: self.config.collection.clone(),
                status: IngestStatus::Skipped,
                warnings,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        // Chunk each page independently; chunk boundaries never cross pages.
        let mut pending: Vec<(String, String, ChunkMetadata)> = Vec::new();
        for (page_idx, text) in extracted.pages.iter().enumerate() {
            let page = page_idx as u32 + 1;
            if text.trim().is_empty() {
                warnings.push(format!("page {page} contains no extractable text"));
                continue;
            }
            for (idx, passage) in
                chunk_text(text, self.config.chunk_size, self.config.chunk_overlap).enumerate()
            {
                let chunk_index = idx as u32;
                let metadata = ChunkMetadata {
                    doc_id: doc_id.clone(),
                    filename: filename.to_string(),
                    page,
                    chunk_index,
                };
                pending.push((chunk_id(&doc_id, page, chunk_index), passage, metadata));
            }
        }

        if pending.is_empty() {
            info!(document.id = %doc_id, filename, "ingestion skipped, no chunks produced");
            return Ok(IngestReport {
                doc_id,
                filename: filename.to_string(),
                bytes: bytes.len(),
                pages: extracted.pages.len(),
                chunks: 0,
                collection: self.config.collection.clone(),
                status: IngestStatus::Skipped,
                warnings,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        if pending.len() > self.config.max_chunks_per_ingest {
            error!(
                document.id = %doc_id,
                chunk_count = pending.len(),
                limit = self.config.max_chunks_per_ingest,
                "ingestion rejected, chunk ceiling exceeded"
            );
            return Err(RagError::Validation(format!(
                "document produces {} chunks, exceeding the limit of {}; \
                 split the document and ingest the parts separately",
                pending.len(),
                self.config.max_chunks_per_ingest
            )));
        }

        // One batched embed call; failure aborts with no index writes.
        let texts: Vec<&str> = pending.iter().map(|(_, text, _)| text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %doc_id, error = %e, "embedding failed during ingestion");
            e
        })?;

        let records: Vec<IndexedRecord> = pending
            .into_iter()
            .zip(embeddings)
            .map(|((id, text, metadata), embedding)| IndexedRecord { id, embedding, text, metadata })
            .collect();

        self.store.upsert(&records).await.map_err(|e| {
            error!(document.id = %doc_id, error = %e, "upsert failed during ingestion");
            e
        })?;

        let report = IngestReport {
            doc_id,
            filename: filename.to_string(),
            bytes: bytes.len(),
            pages: extracted.pages.len(),
            chunks: records.len(),
            collection: self.config.collection.clone(),
            status: IngestStatus::Indexed,
            warnings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            document.id = %report.doc_id,
            filename,
            pages = report.pages,
            chunk_count = report.chunks,
            elapsed_ms = report.elapsed_ms,
            "ingested document"
        );
        Ok(report)
    }

    /// Embed the question and return the nearest chunks, optionally scoped
    /// to one document. Empty results are a valid outcome.
    pub async fn retrieve(
        &self,
        question: &str,
        doc_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<QueryHit>> {
        self.ensure_dependencies().await?;

        let embedding = self.embedder.embed(question).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            e
        })?;
        let hits = self
            .store
            .query(&embedding, top_k.clamp(1, MAX_TOP_K), doc_id)
            .await
            .map_err(|e| {
                error!(error = %e, "vector store query failed");
                e
            })?;
        info!(result_count = hits.len(), "retrieval completed");
        Ok(hits)
    }

    fn validate_question(question: &str, opts: &ChatOptions) -> Result<()> {
        if question.trim().is_empty() {
            return Err(RagError::Validation("question must not be empty".to_string()));
        }
        if opts.mode == RetrievalMode::Hybrid {
            return Err(RagError::Validation(
                "hybrid retrieval mode is not implemented; use docs_only".to_string(),
            ));
        }
        Ok(())
    }

    fn effective_top_k(&self, opts: &ChatOptions) -> usize {
        opts.top_k.unwrap_or(self.config.top_k).clamp(1, MAX_TOP_K)
    }

    /// Answer a question in one shot, returning the full text with citations.
    ///
    /// When retrieval finds no chunks, or the generated answer trims to
    /// empty, the fixed fallback text for the requested language is returned
    /// — that is a defined success outcome, not an error.
    pub async fn answer(&self, question: &str, opts: &ChatOptions) -> Result<ChatAnswer> {
        Self::validate_question(question, opts)?;

        let hits =
            self.retrieve(question, opts.doc_id.as_deref(), self.effective_top_k(opts)).await?;

        let Some(context) = assemble_context(&hits, self.config.max_context_chars) else {
            return Ok(ChatAnswer {
                answer: opts.language.fallback_answer().to_string(),
                citations: Vec::new(),
                used_chunks: 0,
                doc_id: opts.doc_id.clone(),
                collection: self.config.collection.clone(),
                context_preview: opts.return_context.then(|| "(no context)".to_string()),
            });
        };

        let citations = build_citations(&hits, self.config.excerpt_chars);
        let prompt = build_prompt(&context, question, opts.language);
        let raw = self
            .model
            .complete(&prompt, self.config.max_answer_tokens, self.config.temperature)
            .await
            .map_err(|e| {
                error!(error = %e, "generation failed");
                e
            })?;

        let answer = match raw.trim() {
            "" => opts.language.fallback_answer().to_string(),
            trimmed => trimmed.to_string(),
        };

        Ok(ChatAnswer {
            answer,
            citations,
            used_chunks: hits.len(),
            doc_id: opts.doc_id.clone(),
            collection: self.config.collection.clone(),
            context_preview: opts.return_context.then(|| preview(&context)),
        })
    }

    /// Answer a question as an ordered event stream.
    ///
    /// Exactly one `meta` event is emitted first (even with zero citations),
    /// then generated `token` events in arrival order, then exactly one
    /// terminal `done` or `error`. When retrieval finds no chunks the
    /// fallback text is delivered as a single `token` and the generation
    /// service is never called. Failures at any point become a single
    /// terminal `error` event instead of surfacing past the protocol
    /// boundary. Dropping the stream cancels generation at the next read.
    pub fn answer_stream(self: Arc<Self>, question: String, opts: ChatOptions) -> AnswerStream {
        let events = stream! {
            if let Err(e) = Self::validate_question(&question, &opts) {
                yield StreamEvent::Error { detail: e.to_string() };
                return;
            }

            let top_k = self.effective_top_k(&opts);
            let hits = match self.retrieve(&question, opts.doc_id.as_deref(), top_k).await {
                Ok(hits) => hits,
                Err(e) => {
                    yield StreamEvent::Error { detail: e.to_string() };
                    return;
                }
            };

            let citations = build_citations(&hits, self.config.excerpt_chars);
            yield StreamEvent::Meta {
                citations,
                used_chunks: hits.len(),
                doc_id: opts.doc_id.clone(),
                collection: self.config.collection.clone(),
            };

            let Some(context) = assemble_context(&hits, self.config.max_context_chars) else {
                yield StreamEvent::Token {
                    content: opts.language.fallback_answer().to_string(),
                };
                yield StreamEvent::Done;
                return;
            };

            let prompt = build_prompt(&context, &question, opts.language);
            let mut tokens = match self
                .model
                .complete_stream(&prompt, self.config.max_answer_tokens, self.config.temperature)
                .await
            {
                Ok(tokens) => tokens,
                Err(e) => {
                    error!(error = %e, "streaming generation failed to start");
                    yield StreamEvent::Error { detail: e.to_string() };
                    return;
                }
            };

            while let Some(fragment) = tokens.next().await {
                match fragment {
                    Ok(content) => yield StreamEvent::Token { content },
                    Err(e) => {
                        error!(error = %e, "streaming generation failed mid-stream");
                        yield StreamEvent::Error { detail: e.to_string() };
                        return;
                    }
                }
            }
            yield StreamEvent::Done;
        };
        Box::pin(events)
    }

    /// Delete every indexed chunk belonging to `doc_id`.
    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        if !self.store.reachable().await {
            return Err(RagError::DependencyUnavailable {
                dependency: "vector index".to_string(),
                message: "vector index is not reachable".to_string(),
            });
        }
        self.store.delete_document(doc_id).await?;
        info!(document.id = %doc_id, "deleted document from index");
        Ok(())
    }

    /// Total number of chunks in the collection, for diagnostics.
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count().await
    }
}

/// First [`CONTEXT_PREVIEW_CHARS`] characters of the context.
fn preview(context: &str) -> String {
    if context.chars().count() > CONTEXT_PREVIEW_CHARS {
        let mut p: String = context.chars().take(CONTEXT_PREVIEW_CHARS).collect();
        p.push_str("...");
        p
    } else {
        context.to_string()
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// All collaborators are required. Call [`build()`](RagPipelineBuilder::build)
/// to validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn TextExtractor>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    model: Option<Arc<dyn CompletionModel>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text extraction collaborator.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store backend.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the text generation backend.
    pub fn model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Build the [`RagPipeline`], validating that all collaborators are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let extractor =
            self.extractor.ok_or_else(|| RagError::Config("extractor is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let model = self.model.ok_or_else(|| RagError::Config("model is required".to_string()))?;

        Ok(RagPipeline { config, extractor, embedder, store, model })
    }
}
