//! Qdrant vector store backend.
//!
//! This module is only available when the `qdrant` feature is enabled.
//! [`QdrantVectorStore`] implements [`VectorStore`] using the
//! [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC. The
//! collection uses cosine distance; Qdrant's similarity score is converted
//! to cosine distance to satisfy the store's dissimilarity contract.

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{ChunkMetadata, IndexedRecord, QueryHit};
use crate::error::{RagError, Result, StoreErrorKind};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "qdrant";

/// Bound on the reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Chunk text and metadata are stored as point payload; the point id is a
/// deterministic UUIDv5 of the composite chunk id, so re-upserting a chunk
/// overwrites instead of duplicating.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::qdrant::QdrantVectorStore;
///
/// let store = QdrantVectorStore::new("http://localhost:6334", "pdf_chatbot")?;
/// store.ensure_collection(384).await?;
/// ```
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    /// Create a new store connecting to the given URL and collection.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client, collection: collection.into() })
    }

    /// Create a new store from an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    /// Create the collection with the given dimensionality if it does not
    /// exist yet. Call once at startup with the embedding provider's
    /// dimensions.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        if collections.collections.iter().any(|c| c.name == self.collection) {
            debug!(collection = %self.collection, "qdrant collection already exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection.as_str())
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;
        debug!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        let message = e.to_string();
        // Qdrant reports a mismatched vector size as a "dimension error";
        // callers treat that as a changed embedding model.
        let kind = if message.to_ascii_lowercase().contains("dimension") {
            StoreErrorKind::DimensionMismatch
        } else {
            StoreErrorKind::Other
        };
        RagError::Store { backend: BACKEND.to_string(), kind, message }
    }

    fn doc_filter(doc_id: &str) -> Filter {
        Filter::must([Condition::matches("doc_id", doc_id.to_string())])
    }

    fn extract_string(value: Option<&QdrantValue>) -> String {
        match value.and_then(|v| v.kind.as_ref()) {
            Some(Kind::StringValue(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn extract_u32(value: Option<&QdrantValue>) -> u32 {
        match value.and_then(|v| v.kind.as_ref()) {
            Some(Kind::IntegerValue(n)) => *n as u32,
            Some(Kind::DoubleValue(n)) => *n as u32,
            _ => 0,
        }
    }

    /// Qdrant accepts only UUID or integer point ids, so the composite chunk
    /// id is mapped to a deterministic UUIDv5 and kept in the payload. Equal
    /// chunk ids still map to the same point, preserving upsert-overwrite.
    fn point_id(chunk_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                let mut payload = serde_json::Map::new();
                payload.insert("chunk_id".to_string(), record.id.clone().into());
                payload.insert("text".to_string(), record.text.clone().into());
                payload.insert("doc_id".to_string(), record.metadata.doc_id.clone().into());
                payload.insert("filename".to_string(), record.metadata.filename.clone().into());
                payload.insert("page".to_string(), record.metadata.page.into());
                payload.insert("chunk_index".to_string(), record.metadata.chunk_index.into());

                let payload =
                    Payload::try_from(serde_json::Value::Object(payload)).unwrap_or_default();
                PointStruct::new(Self::point_id(&record.id), record.embedding.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.as_str(), points).wait(true))
            .await
            .map_err(Self::map_err)?;
        debug!(collection = %self.collection, count = records.len(), "upserted chunks to qdrant");
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<QueryHit>> {
        let mut request =
            SearchPointsBuilder::new(self.collection.as_str(), embedding.to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(doc_id) = doc_id {
            request = request.filter(Self::doc_filter(doc_id));
        }

        let response = self.client.search_points(request).await.map_err(Self::map_err)?;

        let hits = response
            .result
            .into_iter()
            .map(|scored| {
                // Prefer the composite chunk id from the payload; points
                // written by other tooling fall back to the raw point id.
                let id = match Self::extract_string(scored.payload.get("chunk_id")) {
                    s if !s.is_empty() => s,
                    _ => scored
                        .id
                        .as_ref()
                        .and_then(|pid| match &pid.point_id_options {
                            Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                            None => None,
                        })
                        .unwrap_or_default(),
                };

                QueryHit {
                    id,
                    text: Self::extract_string(scored.payload.get("text")),
                    metadata: ChunkMetadata {
                        doc_id: Self::extract_string(scored.payload.get("doc_id")),
                        filename: Self::extract_string(scored.payload.get("filename")),
                        page: Self::extract_u32(scored.payload.get("page")),
                        chunk_index: Self::extract_u32(scored.payload.get("chunk_index")),
                    },
                    // Cosine similarity to cosine distance.
                    distance: (1.0 - scored.score).max(0.0),
                }
            })
            .collect();
        Ok(hits)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection.as_str())
                    .points(Self::doc_filter(doc_id))
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;
        debug!(collection = %self.collection, doc_id, "deleted document points from qdrant");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection.as_str()).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn reachable(&self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, self.client.health_check()).await,
            Ok(Ok(_))
        )
    }
}
