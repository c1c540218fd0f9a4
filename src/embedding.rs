//! Embedding provider trait and the shared lazily-initialized wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Whether the underlying model is loaded and ready for use.
    fn is_ready(&self) -> bool;
}

/// Async factory that constructs the underlying embedding provider once.
pub type EmbedderFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn EmbeddingProvider>>> + Send + Sync>;

/// A process-wide embedding provider constructed lazily, exactly once.
///
/// Embedding models are expensive to load, so construction is deferred until
/// the first embed call (or an explicit [`warm_up`](SharedEmbedder::warm_up)
/// at startup). Concurrent first use from multiple requests still results in
/// exactly one construction; `tokio::sync::OnceCell` serializes the
/// initializers and all later reads are lock-free.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::SharedEmbedder;
///
/// let embedder = SharedEmbedder::new(Box::new(|| {
///     Box::pin(async { load_model().await })
/// }));
/// embedder.warm_up().await?;
/// ```
pub struct SharedEmbedder {
    cell: OnceCell<Arc<dyn EmbeddingProvider>>,
    factory: EmbedderFactory,
}

impl SharedEmbedder {
    /// Create a shared embedder that will construct its provider on first use.
    pub fn new(factory: EmbedderFactory) -> Self {
        Self { cell: OnceCell::new(), factory }
    }

    /// Construct the underlying provider now if it has not been constructed yet.
    ///
    /// Call this at process startup so readiness checks pass before the
    /// first request arrives.
    pub async fn warm_up(&self) -> Result<()> {
        self.provider().await?;
        Ok(())
    }

    async fn provider(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.cell
            .get_or_try_init(|| async {
                let provider = (self.factory)().await?;
                info!(dimensions = provider.dimensions(), "embedding model loaded");
                Ok::<_, RagError>(provider)
            })
            .await
    }
}

#[async_trait]
impl EmbeddingProvider for SharedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.provider().await?.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.provider().await?.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.cell.get().map(|p| p.dimensions()).unwrap_or(0)
    }

    fn is_ready(&self) -> bool {
        self.cell.get().map(|p| p.is_ready()).unwrap_or(false)
    }
}
