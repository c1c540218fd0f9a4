//! Error types for the `pdfrag` crate.

use thiserror::Error;

/// Distinguishes vector store failure causes that callers react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The vector dimension did not match the index's configured dimension.
    /// Usually means the embedding model changed since the collection was created.
    DimensionMismatch,
    /// Any other store failure (unreachable, rejected request, ...).
    Other,
}

/// Errors that can occur in ingestion, retrieval, and answer generation.
#[derive(Debug, Error)]
pub enum RagError {
    /// The input was rejected before any network call (bad format, over
    /// a size limit, malformed request fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required dependency (embedding model or vector index) is not ready.
    /// The request is rejected before extraction or retrieval starts.
    #[error("Dependency unavailable ({dependency}): {message}")]
    DependencyUnavailable {
        /// The dependency that failed its readiness check.
        dependency: String,
        /// A description of the failure.
        message: String,
    },

    /// The document could not be parsed into page text.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// An embedding call failed.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector index upsert, query, delete, or count failed.
    #[error("Vector store error ({backend}): {message}")]
    Store {
        /// The vector store backend that produced the error.
        backend: String,
        /// Whether this was a dimension mismatch or a generic failure.
        kind: StoreErrorKind,
        /// A description of the failure.
        message: String,
    },

    /// The text generation service failed or was unreachable.
    #[error("Generation error ({backend}): {message}")]
    Generation {
        /// The generation backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Construct a generic store error for the given backend.
    pub fn store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Store {
            backend: backend.into(),
            kind: StoreErrorKind::Other,
            message: message.into(),
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
