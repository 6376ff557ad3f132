//! Conversational RAG orchestrator
//!
//! One utterance in, one answer out: optionally ground the prompt in retrieved
//! passages, call the chat model, and hand back either the full text or a
//! fragment stream. Conversation history lives in the caller's
//! [`ChatSession`]; the orchestrator itself holds no per-turn state.

use futures_util::StreamExt;
use std::sync::Arc;

use crate::config::{ConnectionConfig, GenerationConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, ResponseStream};
use crate::providers::oci::{http_client, probe_endpoint, OciChatClient, OciEmbedder, RequestSigner};
use crate::providers::{LlmProvider, VectorStoreProvider};
use crate::retrieval::{build_context, Retriever};
use crate::session::ChatSession;

/// Builds a chat provider bound to a generation configuration
pub type LlmFactory =
    Arc<dyn Fn(&GenerationConfig) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

/// Output of one turn
#[derive(Debug)]
pub enum Reply {
    /// Full answer, available once the remote call completed
    Complete(String),
    /// Answer delivered fragment by fragment
    Streaming(ResponseStream),
}

impl Reply {
    /// Full answer text, draining the stream if needed
    pub async fn into_text(self) -> Result<String> {
        match self {
            Reply::Complete(text) => Ok(text),
            Reply::Streaming(stream) => stream.collect_text().await,
        }
    }
}

/// Retrieval-augmented chat over one chat model and one vector store
pub struct RagChat {
    llm: Arc<dyn LlmProvider>,
    llm_factory: LlmFactory,
    retriever: Retriever,
    prompts: PromptBuilder,
    generation: GenerationConfig,
    retrieval: RetrievalConfig,
}

impl RagChat {
    /// Connect to OCI Generative AI and Oracle Database
    ///
    /// Fails if the database refuses the connection or the service endpoint
    /// cannot be reached. Nothing is retried.
    pub async fn connect(
        connection: &ConnectionConfig,
        signer: Arc<dyn RequestSigner>,
        generation: GenerationConfig,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        generation.validate()?;
        retrieval.validate()?;

        tracing::info!("Checking service endpoint {}...", connection.service_endpoint);
        let http = http_client()?;
        probe_endpoint(&http, &connection.service_endpoint).await?;

        let chat_client = OciChatClient::new(
            connection.service_endpoint.clone(),
            connection.compartment_id.clone(),
            generation.clone(),
            Arc::clone(&signer),
        )?;
        let llm_factory: LlmFactory = Arc::new(move |g: &GenerationConfig| {
            let client: Arc<dyn LlmProvider> = Arc::new(chat_client.with_generation(g.clone())?);
            Ok(client)
        });

        let embedder = Arc::new(OciEmbedder::new(
            connection.service_endpoint.clone(),
            connection.compartment_id.clone(),
            signer,
        )?);
        let store = open_store(connection).await?;
        let retriever = Retriever::new(embedder, store, retrieval.fetch_k);

        Self::from_parts(llm_factory, retriever, generation, retrieval)
    }

    /// Assemble from arbitrary providers
    pub fn from_parts(
        llm_factory: LlmFactory,
        retriever: Retriever,
        generation: GenerationConfig,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        generation.validate()?;
        retrieval.validate()?;

        let llm = llm_factory(&generation)?;
        tracing::info!(
            "Chat ready: {} via {} (vector search: {}, k={})",
            llm.model(),
            llm.name(),
            retrieval.enabled,
            retrieval.fetch_k
        );

        Ok(Self {
            llm,
            llm_factory,
            retriever: retriever.with_top_k(retrieval.fetch_k),
            prompts: PromptBuilder::standard()?,
            generation,
            retrieval,
        })
    }

    /// Replace the bundled prompt templates
    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Rebind the chat model to new sampling parameters
    pub fn set_generation(&mut self, generation: GenerationConfig) -> Result<()> {
        generation.validate()?;
        self.llm = (self.llm_factory)(&generation)?;
        tracing::info!("Chat model bound to {}", self.llm.model());
        self.generation = generation;
        Ok(())
    }

    /// Change the vector search settings
    pub fn set_retrieval(&mut self, retrieval: RetrievalConfig) -> Result<()> {
        retrieval.validate()?;
        self.retriever = self.retriever.with_top_k(retrieval.fetch_k);
        self.retrieval = retrieval;
        Ok(())
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Build the prompt for an utterance, retrieving context if asked
    pub async fn render_prompt(&self, utterance: &str, use_retrieval: bool) -> Result<String> {
        if utterance.trim().is_empty() {
            return Err(Error::InvalidInput("Utterance is empty".to_string()));
        }

        let prompt = if use_retrieval {
            let passages = self.retriever.retrieve(utterance).await?;
            self.prompts.grounded(utterance, &build_context(&passages))?
        } else {
            self.prompts.plain(utterance)?
        };

        tracing::debug!(
            "Rendered {} prompt ({} chars)",
            if use_retrieval { "grounded" } else { "plain" },
            prompt.len()
        );
        Ok(prompt)
    }

    /// Answer one utterance
    ///
    /// Network, authentication, and malformed-response failures from either
    /// retrieval or generation are returned as-is.
    pub async fn respond(
        &self,
        utterance: &str,
        streaming: bool,
        use_retrieval: bool,
    ) -> Result<Reply> {
        let prompt = self.render_prompt(utterance, use_retrieval).await?;

        if streaming {
            Ok(Reply::Streaming(self.llm.generate_stream(&prompt).await?))
        } else {
            Ok(Reply::Complete(self.llm.generate(&prompt).await?))
        }
    }

    /// Run a full turn against a session
    ///
    /// Fragments reach `on_fragment` in emission order (a complete answer
    /// arrives as a single fragment). The user and assistant turns are
    /// appended only after the answer finished; on error the session is left
    /// untouched.
    pub async fn converse<F>(
        &self,
        session: &mut ChatSession,
        utterance: &str,
        streaming: bool,
        use_retrieval: bool,
        mut on_fragment: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let answer = match self.respond(utterance, streaming, use_retrieval).await? {
            Reply::Complete(text) => {
                on_fragment(&text);
                text
            }
            Reply::Streaming(mut stream) => {
                let mut text = String::new();
                while let Some(fragment) = stream.next().await {
                    let fragment = fragment?;
                    on_fragment(&fragment);
                    text.push_str(&fragment);
                }
                text
            }
        };

        session.record(utterance, answer.clone());
        Ok(answer)
    }

    /// Check the chat model, embedder, and vector store
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.llm.health_check().await? && self.retriever.health_check().await?)
    }
}

#[cfg(feature = "oracle")]
async fn open_store(connection: &ConnectionConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    let store = crate::providers::oracle::OracleVectorStore::connect(connection).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "oracle"))]
async fn open_store(_connection: &ConnectionConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    Err(Error::Config(
        "Vector search requires building with the `oracle` feature".to_string(),
    ))
}
