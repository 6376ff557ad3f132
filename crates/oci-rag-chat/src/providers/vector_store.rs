//! Vector store provider trait for similarity search

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Search result from vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResult {
    /// Stored passage text
    pub content: String,
    /// Distance to the query under the store's metric (lower is closer)
    pub distance: Option<f64>,
}

impl VectorSearchResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            distance: None,
        }
    }
}

/// Similarity metric used to rank stored vectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStrategy {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl DistanceStrategy {
    /// Metric keyword for `VECTOR_DISTANCE`
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            DistanceStrategy::Cosine => "COSINE",
            DistanceStrategy::Euclidean => "EUCLIDEAN",
            DistanceStrategy::DotProduct => "DOT",
        }
    }
}

/// Trait for nearest-neighbour passage lookup
///
/// Implementations:
/// - `OracleVectorStore`: Oracle Database 23ai `VECTOR_DISTANCE` query
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Return up to `top_k` passages nearest to the query embedding, closest first
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Metric used for ranking
    fn distance_strategy(&self) -> DistanceStrategy;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
