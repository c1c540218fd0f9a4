//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Upper bound on `top_k` accepted by the retrieval entry points.
pub const MAX_TOP_K: usize = 20;

/// Configuration parameters for ingestion, retrieval, and answer generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to retrieve from vector search.
    pub top_k: usize,
    /// Maximum total characters of retrieved text fed to the generation service.
    pub max_context_chars: usize,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Maximum number of chunks a single ingestion may produce. Documents
    /// exceeding this are rejected outright rather than partially indexed.
    pub max_chunks_per_ingest: usize,
    /// Maximum characters of a citation excerpt (display only).
    pub excerpt_chars: usize,
    /// Token budget passed to the generation service.
    pub max_answer_tokens: u32,
    /// Sampling temperature passed to the generation service.
    pub temperature: f32,
    /// Name of the vector index collection holding the chunks.
    pub collection: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            max_context_chars: 6000,
            max_upload_bytes: 50 * 1024 * 1024,
            max_chunks_per_ingest: 2000,
            excerpt_chars: 400,
            max_answer_tokens: 800,
            temperature: 0.2,
            collection: "pdf_chatbot".to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to retrieve from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the context character budget.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the maximum accepted upload size in bytes.
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Set the per-ingestion chunk ceiling.
    pub fn max_chunks_per_ingest(mut self, chunks: usize) -> Self {
        self.config.max_chunks_per_ingest = chunks;
        self
    }

    /// Set the citation excerpt length in characters.
    pub fn excerpt_chars(mut self, chars: usize) -> Self {
        self.config.excerpt_chars = chars;
        self
    }

    /// Set the token budget for generated answers.
    pub fn max_answer_tokens(mut self, tokens: u32) -> Self {
        self.config.max_answer_tokens = tokens;
        self
    }

    /// Set the sampling temperature for generated answers.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the vector index collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size` (the chunk window would not advance)
    /// - `top_k` is outside `1..=MAX_TOP_K`
    /// - `max_context_chars`, `max_chunks_per_ingest`, or `excerpt_chars` is zero
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 || c.top_k > MAX_TOP_K {
            return Err(RagError::Config(format!(
                "top_k ({}) must be between 1 and {MAX_TOP_K}",
                c.top_k
            )));
        }
        if c.max_context_chars == 0 {
            return Err(RagError::Config("max_context_chars must be greater than zero".to_string()));
        }
        if c.max_chunks_per_ingest == 0 {
            return Err(RagError::Config(
                "max_chunks_per_ingest must be greater than zero".to_string(),
            ));
        }
        if c.excerpt_chars == 0 {
            return Err(RagError::Config("excerpt_chars must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}
