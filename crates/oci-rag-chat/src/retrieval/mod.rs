//! Query-time retrieval: embed the utterance, fetch the top-k passages, and
//! format them as a prompt context block

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorSearchResult, VectorStoreProvider};

/// Maps a query to its most similar stored passages
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    /// Same providers, different fetch count
    pub fn with_top_k(&self, top_k: usize) -> Self {
        Self {
            top_k,
            ..self.clone()
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Fetch up to `top_k` passages, closest first
    pub async fn retrieve(&self, query: &str) -> Result<Vec<VectorSearchResult>> {
        let embedding = self.embedder.embed(query).await?;
        if embedding.is_empty() {
            return Err(Error::embedding("Embedding service returned an empty vector"));
        }

        let results = self.store.search(&embedding, self.top_k).await?;
        tracing::debug!(
            "Retrieved {} passages (k={}, metric={:?}) from {}",
            results.len(),
            self.top_k,
            self.store.distance_strategy(),
            self.store.name()
        );
        Ok(results)
    }

    /// Check both providers
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.embedder.health_check().await? && self.store.health_check().await?)
    }
}

/// Number the passages and join them into one context block
pub fn build_context(results: &[VectorSearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[{}] {}", i + 1, result.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
