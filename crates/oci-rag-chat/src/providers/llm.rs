//! LLM provider trait for chat completion

use async_trait::async_trait;
use crate::error::Result;
use crate::generation::ResponseStream;

/// Trait for prompt-in, text-out chat completion
///
/// Sampling parameters are bound when the provider is built.
///
/// Implementations:
/// - `OciChatClient`: OCI Generative AI (cohere.command-r-plus, cohere.command-r-16k)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate the complete answer for a rendered prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate the answer as a stream of fragments
    async fn generate_stream(&self, prompt: &str) -> Result<ResponseStream>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
