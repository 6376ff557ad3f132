//! Provider abstractions for embeddings, chat completion, and vector search
//!
//! The orchestrator only sees these traits, so the OCI and Oracle backends can
//! be swapped for other services or test doubles.

pub mod embedding;
pub mod llm;
pub mod oci;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use vector_store::{DistanceStrategy, VectorSearchResult, VectorStoreProvider};
