//! OCI Generative AI provider implementations
//!
//! - Cohere Command R / R+ chat completion (atomic and SSE streaming)
//! - cohere.embed-multilingual-v3.0 query embeddings
//! - API-key HTTP signature authentication

mod auth;
mod chat_client;
mod embedder;

pub use auth::{ApiKeySigner, NoAuth, OciProfile, RequestSigner};
pub use chat_client::OciChatClient;
pub use embedder::OciEmbedder;

use serde::Serialize;
use std::time::Duration;

use crate::config::API_VERSION;
use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence tolerated between reads; a slow stream that keeps
/// delivering is never cut off
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// `servingMode` block shared by chat and embedding requests
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServingMode {
    serving_type: &'static str,
    model_id: String,
}

impl ServingMode {
    pub(crate) fn on_demand(model_id: impl Into<String>) -> Self {
        Self {
            serving_type: "ON_DEMAND",
            model_id: model_id.into(),
        }
    }
}

/// HTTP client used for all inference calls and the startup probe
pub(crate) fn http_client() -> Result<reqwest::Client> {
    http_client_with(CONNECT_TIMEOUT, READ_TIMEOUT)
}

fn http_client_with(connect: Duration, read: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect)
        .read_timeout(read)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// `{endpoint}/20231130/actions/{action}`
pub(crate) fn action_url(endpoint: &str, action: &str) -> String {
    format!(
        "{}/{}/actions/{}",
        endpoint.trim_end_matches('/'),
        API_VERSION,
        action
    )
}

/// Build, sign, and send a JSON POST
pub(crate) async fn post_signed<T: Serialize>(
    http: &reqwest::Client,
    signer: &dyn RequestSigner,
    url: &str,
    body: &T,
    accept: &str,
) -> Result<reqwest::Response> {
    let payload = serde_json::to_vec(body)?;
    let mut request = http
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(reqwest::header::ACCEPT, accept)
        .body(payload)
        .build()?;
    signer.sign(&mut request)?;
    Ok(http.execute(request).await?)
}

/// Status line plus body of a failed response
pub(crate) async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {} - {}", status, body)
}

/// Confirm the endpoint answers at all
///
/// Any HTTP status counts as reachable; only transport failures (DNS,
/// connect, TLS, timeout) are errors.
pub async fn probe_endpoint(http: &reqwest::Client, endpoint: &str) -> Result<()> {
    match http.get(endpoint).send().await {
        Ok(response) => {
            tracing::debug!("Endpoint {} answered {}", endpoint, response.status());
            Ok(())
        }
        Err(e) => Err(Error::Llm(format!(
            "Service endpoint {} is unreachable: {}",
            endpoint, e
        ))),
    }
}
