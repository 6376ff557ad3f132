//! Cohere chat completion via OCI Generative AI

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::RequestSigner;
use super::{action_url, describe_failure, http_client, post_signed, probe_endpoint, ServingMode};
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::generation::stream::{sse_fragments, ResponseStream, SseEvent};
use crate::providers::llm::LlmProvider;

/// OCI Generative AI chat client bound to one model and sampling setup
#[derive(Clone)]
pub struct OciChatClient {
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    endpoint: String,
    compartment_id: String,
    generation: GenerationConfig,
}

impl OciChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `endpoint` - Inference endpoint, e.g. `https://inference.generativeai.us-chicago-1.oci.oraclecloud.com`
    /// * `compartment_id` - Compartment OCID billed for the calls
    /// * `generation` - Model and sampling parameters
    /// * `signer` - Request authentication
    pub fn new(
        endpoint: impl Into<String>,
        compartment_id: impl Into<String>,
        generation: GenerationConfig,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self> {
        generation.validate()?;
        Ok(Self {
            http: http_client()?,
            signer,
            endpoint: endpoint.into(),
            compartment_id: compartment_id.into(),
            generation,
        })
    }

    /// Same connection, different model or sampling parameters
    pub fn with_generation(&self, generation: GenerationConfig) -> Result<Self> {
        generation.validate()?;
        Ok(Self {
            generation,
            ..self.clone()
        })
    }

    /// Parameters this client sends
    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    fn request<'a>(&'a self, prompt: &'a str, is_stream: bool) -> ChatRequest<'a> {
        let g = &self.generation;
        ChatRequest {
            compartment_id: &self.compartment_id,
            serving_mode: ServingMode::on_demand(g.model.id()),
            chat_request: CohereChatRequest {
                api_format: "COHERE",
                message: prompt,
                is_stream,
                max_tokens: g.max_tokens,
                temperature: g.temperature,
                top_k: g.top_k,
                top_p: g.top_p,
                frequency_penalty: g.frequency_penalty,
                presence_penalty: g.presence_penalty,
            },
        }
    }

    async fn send(&self, prompt: &str, is_stream: bool) -> Result<reqwest::Response> {
        let url = action_url(&self.endpoint, "chat");
        let accept = if is_stream { "text/event-stream" } else { "application/json" };
        let request = self.request(prompt, is_stream);

        let response = post_signed(&self.http, self.signer.as_ref(), &url, &request, accept)
            .await
            .map_err(|e| match e {
                Error::Http(e) => Error::Llm(format!("Chat request failed: {}", e)),
                other => other,
            })?;

        if !response.status().is_success() {
            return Err(Error::Llm(format!(
                "Chat failed: {}",
                describe_failure(response).await
            )));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    compartment_id: &'a str,
    serving_mode: ServingMode,
    chat_request: CohereChatRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CohereChatRequest<'a> {
    api_format: &'static str,
    message: &'a str,
    is_stream: bool,
    max_tokens: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    chat_response: CohereChatResponse,
}

#[derive(Deserialize)]
struct CohereChatResponse {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamEvent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify one SSE payload
///
/// The closing event repeats the whole answer alongside `finishReason` and
/// ends the stream. An event with neither text nor `finishReason` (such as
/// an in-band service error) fails the stream.
fn parse_stream_event(payload: &str) -> Result<SseEvent> {
    let event: StreamEvent = serde_json::from_str(payload)
        .map_err(|e| Error::Llm(format!("Malformed stream event: {}: {}", e, payload)))?;

    if let Some(reason) = event.finish_reason {
        tracing::debug!("Chat stream finished: {}", reason);
        return Ok(SseEvent::Finished);
    }
    match event.text {
        Some(text) if text.is_empty() => Ok(SseEvent::Ignore),
        Some(text) => Ok(SseEvent::Fragment(text)),
        None => Err(Error::Llm(match (event.code, event.message) {
            (Some(code), Some(message)) => format!("Chat stream failed: {} - {}", code, message),
            (None, Some(message)) => format!("Chat stream failed: {}", message),
            _ => format!("Malformed stream event: {}", payload),
        })),
    }
}

#[async_trait]
impl LlmProvider for OciChatClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with model: {}", self.generation.model);

        let response = self.send(prompt, false).await?;
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Failed to parse chat response: {}", e)))?;

        Ok(chat.chat_response.text)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ResponseStream> {
        tracing::info!("Streaming answer with model: {}", self.generation.model);

        let response = self.send(prompt, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Llm(format!("Stream error: {}", e))));

        Ok(sse_fragments(bytes, parse_stream_event))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(probe_endpoint(&self.http, &self.endpoint).await.is_ok())
    }

    fn name(&self) -> &str {
        "oci-genai"
    }

    fn model(&self) -> &str {
        self.generation.model.id()
    }
}
