//! oci-rag-chat: Conversational RAG over OCI Generative AI and Oracle Database 23ai
//!
//! Each user utterance is optionally grounded in the top-k passages found by
//! cosine vector search, rendered into a prompt, and answered by a Cohere chat
//! model either atomically or as a stream of text fragments.

pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod providers;
pub mod retrieval;
pub mod session;

pub use chat::{LlmFactory, RagChat, Reply};
pub use config::{ChatModel, ChatSettings, ConnectionConfig, GenerationConfig, OciAuthConfig, RetrievalConfig};
pub use error::{Error, Result};
pub use generation::ResponseStream;
pub use session::{ChatSession, Role, Turn};
