//! Vector store trait for indexing and similarity search over chunks.

use async_trait::async_trait;

use crate::document::{IndexedRecord, QueryHit};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// The distance contract: [`query`](VectorStore::query) returns hits ordered
/// by ascending distance, where distance is a non-negative dissimilarity
/// measure with no fixed upper bound. Implementations substituting a bounded
/// similarity metric must convert it, since citation scoring inverts
/// distances.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert(&records).await?;
/// let hits = store.query(&query_embedding, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert records into the index. Records with existing ids are
    /// overwritten, never duplicated.
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()>;

    /// Return the `top_k` records nearest to `embedding`, ordered by
    /// ascending distance, optionally restricted to one document id.
    ///
    /// An empty result is a valid outcome, not an error.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<QueryHit>>;

    /// Delete every record whose metadata document id matches `doc_id`.
    async fn delete_document(&self, doc_id: &str) -> Result<()>;

    /// Total number of records in the index.
    async fn count(&self) -> Result<usize>;

    /// Probe whether the backend is reachable, within a bounded timeout.
    async fn reachable(&self) -> bool;
}
