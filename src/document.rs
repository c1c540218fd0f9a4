//! Data types for indexed chunks, query results, citations, and reports.

use serde::{Deserialize, Serialize};

/// Metadata stored alongside every indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Opaque id of the document this chunk belongs to.
    pub doc_id: String,
    /// Display name of the source document.
    pub filename: String,
    /// 1-based page number within the source document.
    pub page: u32,
    /// 0-based chunk index within that page.
    pub chunk_index: u32,
}

/// Build the stable composite chunk id `{doc_id}:{page}:{chunk_index}`.
///
/// Ids are deterministic for a given document id, so re-upserting a
/// chunk overwrites instead of duplicating.
pub fn chunk_id(doc_id: &str, page: u32, chunk_index: u32) -> String {
    format!("{doc_id}:{page}:{chunk_index}")
}

/// The durable tuple stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    /// Composite chunk id, see [`chunk_id`].
    pub id: String,
    /// The embedding vector for this chunk's text.
    pub embedding: Vec<f32>,
    /// The chunk text.
    pub text: String,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

/// One similarity search result: a chunk with its distance to the query.
///
/// Distance is a non-negative dissimilarity measure; lower means more
/// similar. Results are ordered by ascending distance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryHit {
    /// Composite chunk id.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
    /// Dissimilarity to the query embedding.
    pub distance: f32,
}

/// Provenance record for one retrieved chunk, shown alongside an answer.
///
/// Excerpts are for display only and never re-enter the generation context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Composite chunk id.
    pub chunk_id: String,
    /// Display name of the source document.
    pub filename: String,
    /// 1-based page number.
    pub page: u32,
    /// Similarity score in `(0, 1]`, higher is more relevant.
    pub score: f32,
    /// Bounded excerpt of the chunk text.
    pub excerpt: String,
}

/// A generated answer together with the citations behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAnswer {
    /// The answer text.
    pub answer: String,
    /// Citations for the chunks used to build the context.
    pub citations: Vec<Citation>,
    /// How many chunks were consulted.
    pub used_chunks: usize,
    /// Document scope of the query, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Name of the collection that was searched.
    pub collection: String,
    /// First characters of the assembled context, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_preview: Option<String>,
}

/// Whether an ingestion wrote chunks to the index or skipped the document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// Chunks were embedded and written to the index.
    Indexed,
    /// The document yielded no extractable text; nothing was written.
    Skipped,
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Freshly allocated document id.
    pub doc_id: String,
    /// Display name of the uploaded document.
    pub filename: String,
    /// Upload size in bytes.
    pub bytes: usize,
    /// Number of pages the extractor produced.
    pub pages: usize,
    /// Number of chunks written to the index.
    pub chunks: usize,
    /// Name of the target collection.
    pub collection: String,
    /// Whether the document was indexed or skipped.
    pub status: IngestStatus,
    /// Non-fatal conditions observed during ingestion (blank pages, ...).
    pub warnings: Vec<String>,
    /// Wall-clock processing time in milliseconds.
    pub elapsed_ms: u64,
}

/// Answer language for prompts and the fixed fallback text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// German.
    De,
    /// English.
    #[default]
    En,
}

impl Language {
    /// The fixed answer returned when retrieval finds nothing relevant.
    pub fn fallback_answer(self) -> &'static str {
        match self {
            Language::De => "Nicht im Dokument.",
            Language::En => "Not found in the document.",
        }
    }
}

/// Retrieval mode requested by the caller.
///
/// Only [`DocsOnly`](RetrievalMode::DocsOnly) is implemented; `Hybrid` is
/// a reserved placeholder and is rejected as a validation error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Answer purely from retrieved document chunks.
    #[default]
    DocsOnly,
    /// Reserved for future ranking fusion with non-vector signals.
    Hybrid,
}

/// Caller-facing options for the answer entry points.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatOptions {
    /// Restrict retrieval to one document id.
    pub doc_id: Option<String>,
    /// Override the configured `top_k` (clamped to `1..=MAX_TOP_K`).
    pub top_k: Option<usize>,
    /// Answer language.
    pub language: Language,
    /// Retrieval mode.
    pub mode: RetrievalMode,
    /// Include a context preview in the non-streaming answer.
    pub return_context: bool,
}
