//! In-memory vector store using cosine distance.
//!
//! [`InMemoryVectorStore`] keeps records in a `HashMap` behind a
//! `tokio::sync::RwLock`. It is suitable for development, testing, and
//! small-scale use; production deployments use the `qdrant` backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexedRecord, QueryHit};
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// An in-memory [`VectorStore`] ranking by cosine distance.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, IndexedRecord>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance `1 - cos(a, b)`, floored at zero.
///
/// Returns 1.0 (maximal uncorrelated distance) if either vector has zero
/// magnitude.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()> {
        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<QueryHit>> {
        let map = self.records.read().await;
        let mut hits: Vec<QueryHit> = map
            .values()
            .filter(|r| doc_id.is_none_or(|d| r.metadata.doc_id == d))
            .map(|r| QueryHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(&r.embedding, embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<()> {
        let mut map = self.records.write().await;
        map.retain(|_, r| r.metadata.doc_id != doc_id);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    async fn reachable(&self) -> bool {
        true
    }
}
