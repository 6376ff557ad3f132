//! Deterministic providers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use oci_rag_chat::providers::{
    DistanceStrategy, EmbeddingProvider, LlmProvider, VectorSearchResult, VectorStoreProvider,
};
use oci_rag_chat::retrieval::Retriever;
use oci_rag_chat::{Error, GenerationConfig, LlmFactory, ResponseStream, Result};

pub const PASSAGES: [&str; 5] = [
    "Oracle Database 23ai introduces AI Vector Search.",
    "The VECTOR data type stores embeddings.",
    "VECTOR_DISTANCE computes similarity between vectors.",
    "Autonomous Database connects through a wallet.",
    "OCI Generative AI hosts Cohere models.",
];

pub struct FakeEmbedder {
    pub fail: bool,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(Error::embedding("embedding service unavailable"));
        }
        Ok(vec![text.len() as f32, 1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "fake-embedder"
    }
}

/// Returns the first `top_k` passages and records each requested `top_k`
#[derive(Default)]
pub struct FakeStore {
    pub requested_k: Mutex<Vec<usize>>,
}

#[async_trait]
impl VectorStoreProvider for FakeStore {
    async fn search(&self, _query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        self.requested_k.lock().unwrap().push(top_k);
        Ok(PASSAGES
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(i, p)| VectorSearchResult {
                content: p.to_string(),
                distance: Some(i as f64 * 0.1),
            })
            .collect())
    }

    fn distance_strategy(&self) -> DistanceStrategy {
        DistanceStrategy::Cosine
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake-store"
    }
}

/// Answers every prompt with the same text and records the prompts it saw
pub struct FakeLlm {
    pub answer: String,
    pub model: String,
    pub fail: bool,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::llm("connection refused"));
        }
        Ok(self.answer.clone())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ResponseStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::llm("connection refused"));
        }
        let fragments: Vec<String> = self
            .answer
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        Ok(ResponseStream::from_fragments(fragments))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "fake-llm"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub struct Harness {
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub store: Arc<FakeStore>,
    pub factory: LlmFactory,
    pub retriever: Retriever,
}

pub fn harness(answer: &str, llm_fails: bool, embedder_fails: bool) -> Harness {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(FakeStore::default());

    let answer = answer.to_string();
    let factory_prompts = Arc::clone(&prompts);
    let factory: LlmFactory = Arc::new(move |g: &GenerationConfig| {
        let llm: Arc<dyn LlmProvider> = Arc::new(FakeLlm {
            answer: answer.clone(),
            model: g.model.id().to_string(),
            fail: llm_fails,
            prompts: Arc::clone(&factory_prompts),
        });
        Ok(llm)
    });

    let retriever = Retriever::new(
        Arc::new(FakeEmbedder { fail: embedder_fails }),
        store.clone(),
        3,
    );

    Harness {
        prompts,
        store,
        factory,
        retriever,
    }
}
