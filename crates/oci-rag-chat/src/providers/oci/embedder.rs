//! OCI Generative AI embedding provider
//!
//! Embeds search queries with cohere.embed-multilingual-v3.0 (1024 dimensions).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::RequestSigner;
use super::{action_url, describe_failure, http_client, post_signed, probe_endpoint, ServingMode};
use crate::config::EMBEDDING_MODEL;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;

/// Inputs accepted per embedText call
const MAX_BATCH: usize = 96;

/// OCI embedding client
pub struct OciEmbedder {
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
    endpoint: String,
    compartment_id: String,
    model: String,
    dimensions: usize,
}

impl OciEmbedder {
    /// Create a new embedder
    ///
    /// # Arguments
    /// * `endpoint` - Inference endpoint
    /// * `compartment_id` - Compartment OCID billed for the calls
    /// * `signer` - Request authentication
    pub fn new(
        endpoint: impl Into<String>,
        compartment_id: impl Into<String>,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            signer,
            endpoint: endpoint.into(),
            compartment_id: compartment_id.into(),
            model: EMBEDDING_MODEL.to_string(),
            dimensions: 1024,
        })
    }

    /// Use a different embedding model
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    async fn embed_chunk(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = action_url(&self.endpoint, "embedText");
        let request = EmbedRequest {
            inputs,
            serving_mode: ServingMode::on_demand(&self.model),
            compartment_id: &self.compartment_id,
            input_type: "SEARCH_QUERY",
            truncate: "END",
        };

        let response = post_signed(
            &self.http,
            self.signer.as_ref(),
            &url,
            &request,
            "application/json",
        )
        .await
        .map_err(|e| match e {
            Error::Http(e) => Error::Embedding(format!("Embedding request failed: {}", e)),
            other => other,
        })?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "Embedding failed: {}",
                describe_failure(response).await
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if embed_response.embeddings.len() != inputs.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                inputs.len(),
                embed_response.embeddings.len()
            )));
        }
        Ok(embed_response.embeddings)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    serving_mode: ServingMode,
    compartment_id: &'a str,
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OciEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_chunk(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH) {
            all.extend(self.embed_chunk(chunk).await?);
        }
        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(probe_endpoint(&self.http, &self.endpoint).await.is_ok())
    }

    fn name(&self) -> &str {
        "oci-genai"
    }
}
