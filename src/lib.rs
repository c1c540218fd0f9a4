//! Retrieval-augmented question answering over uploaded documents.
//!
//! `pdfrag` answers natural-language questions using only content extracted
//! from user-uploaded documents, citing the supporting passages. The crate
//! covers the full pipeline core:
//!
//! - **Ingestion**: extraction → per-page chunking → batched embedding →
//!   vector indexing, all-or-nothing per document, with size limits enforced
//!   before any network call.
//! - **Retrieval**: similarity search with optional per-document scope, a
//!   character-budgeted context assembler, and distance-based citation
//!   scoring.
//! - **Answering**: a single-shot variant and a streaming protocol that
//!   delivers retrieval metadata (`meta`) before any generated text
//!   (`token`), terminated by exactly one `done` or `error` event.
//!
//! External services are injected behind traits: [`TextExtractor`],
//! [`EmbeddingProvider`], [`VectorStore`], and [`CompletionModel`]. The
//! crate ships an [`InMemoryVectorStore`] for development and tests, a
//! Qdrant backend (feature `qdrant`), and a llama.cpp completion backend
//! (feature `llama`).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use pdfrag::{ChatOptions, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = Arc::new(
//!     RagPipeline::builder()
//!         .config(RagConfig::default())
//!         .extractor(extractor)
//!         .embedder(embedder)
//!         .store(Arc::new(InMemoryVectorStore::new()))
//!         .model(model)
//!         .build()?,
//! );
//!
//! pipeline.ingest(&pdf_bytes, "report.pdf").await?;
//!
//! let mut events = pipeline.answer_stream("What is the total?".into(), ChatOptions::default());
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod inmemory;
pub mod pipeline;
pub mod retrieval;
pub mod stream;
pub mod vectorstore;

#[cfg(feature = "llama")]
pub mod llama;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::chunk_text;
pub use config::{MAX_TOP_K, RagConfig, RagConfigBuilder};
pub use document::{
    ChatAnswer, ChatOptions, ChunkMetadata, Citation, IndexedRecord, IngestReport, IngestStatus,
    Language, QueryHit, RetrievalMode, chunk_id,
};
pub use embedding::{EmbedderFactory, EmbeddingProvider, SharedEmbedder};
pub use error::{RagError, Result, StoreErrorKind};
pub use extract::{ExtractedDocument, TextExtractor};
pub use generation::{CompletionModel, TokenStream};
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retrieval::{assemble_context, build_citations, similarity_score};
pub use stream::{AnswerStream, StreamEvent};
pub use vectorstore::VectorStore;

#[cfg(feature = "llama")]
pub use llama::LlamaCppClient;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
