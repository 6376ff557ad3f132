//! HTTP-level tests of the OCI Generative AI clients

mod common;

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oci_rag_chat::providers::oci::{probe_endpoint, NoAuth, OciChatClient, OciEmbedder};
use oci_rag_chat::providers::{EmbeddingProvider, LlmProvider};
use oci_rag_chat::{
    ChatModel, ChatSession, ConnectionConfig, Error, GenerationConfig, LlmFactory, RagChat,
    RetrievalConfig,
};

const COMPARTMENT: &str = "ocid1.compartment.oc1..test";

fn chat_client(server: &MockServer, generation: GenerationConfig) -> OciChatClient {
    OciChatClient::new(server.uri(), COMPARTMENT, generation, Arc::new(NoAuth)).unwrap()
}

fn sse_body(fragments: &[&str], full: &str) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"apiFormat": "COHERE", "text": fragment})
        ));
    }
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"apiFormat": "COHERE", "text": full, "finishReason": "COMPLETE"})
    ));
    body
}

#[tokio::test]
async fn test_chat_atomic_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .and(body_partial_json(json!({
            "compartmentId": COMPARTMENT,
            "servingMode": {"servingType": "ON_DEMAND", "modelId": "cohere.command-r-plus"},
            "chatRequest": {"apiFormat": "COHERE", "message": "Hi", "isStream": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modelId": "cohere.command-r-plus",
            "chatResponse": {"apiFormat": "COHERE", "text": "Hello!", "finishReason": "COMPLETE"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = chat_client(&server, GenerationConfig::default());
    assert_eq!(client.generate("Hi").await.unwrap(), "Hello!");
}

#[tokio::test]
async fn test_max_tokens_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .and(body_partial_json(json!({
            "servingMode": {"modelId": "cohere.command-r-16k"},
            "chatRequest": {"maxTokens": 10, "topK": 0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chatResponse": {"text": "Short."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generation = GenerationConfig {
        model: ChatModel::CommandR16k,
        max_tokens: 10,
        ..GenerationConfig::default()
    };
    let client = chat_client(&server, generation);
    assert_eq!(client.generate("Be brief").await.unwrap(), "Short.");
}

#[tokio::test]
async fn test_chat_stream_matches_atomic() {
    let server = MockServer::start().await;
    let fragments = ["Vector ", "search ", "is ", "fast."];
    let full: String = fragments.concat();

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .and(body_partial_json(json!({"chatRequest": {"isStream": true}})))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&fragments, &full), "text/event-stream"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .and(body_partial_json(json!({"chatRequest": {"isStream": false}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chatResponse": {"text": full}
        })))
        .mount(&server)
        .await;

    let client = chat_client(&server, GenerationConfig::default());

    let mut stream = client.generate_stream("q").await.unwrap();
    let mut received = Vec::new();
    while let Some(fragment) = stream.next_fragment().await {
        received.push(fragment.unwrap());
    }

    assert_eq!(received, fragments);
    assert_eq!(received.concat(), client.generate("q").await.unwrap());
}

#[tokio::test]
async fn test_malformed_stream_event_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("data: {\"text\":\"ok\"}\n\ndata: garbage\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = chat_client(&server, GenerationConfig::default());
    let stream = client.generate_stream("q").await.unwrap();

    assert!(matches!(stream.collect_text().await, Err(Error::Llm(_))));
}

#[tokio::test]
async fn test_stream_without_finish_event_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"text\":\"The answer \"}\n\ndata: {\"text\":\"is\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let client = chat_client(&server, GenerationConfig::default());

    let mut stream = client.generate_stream("q").await.unwrap();
    assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "The answer ");
    assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "is");
    assert!(matches!(stream.next_fragment().await, Some(Err(Error::Llm(_)))));
    assert!(stream.next_fragment().await.is_none());

    let stream = client.generate_stream("q").await.unwrap();
    assert!(stream.collect_text().await.is_err());
}

#[tokio::test]
async fn test_in_band_stream_error_fails_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"text\":\"The answer is\"}\n\n\
             data: {\"code\":\"InternalServerError\",\"message\":\"model crashed\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let client = chat_client(&server, GenerationConfig::default());
    let err = client
        .generate_stream("q")
        .await
        .unwrap()
        .collect_text()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model crashed"));

    let h = common::harness("unused", false, false);
    let factory: LlmFactory = Arc::new(move |g: &GenerationConfig| {
        let llm: Arc<dyn LlmProvider> = Arc::new(client.with_generation(g.clone())?);
        Ok(llm)
    });
    let chat = RagChat::from_parts(
        factory,
        h.retriever.clone(),
        GenerationConfig::default(),
        RetrievalConfig::default(),
    )
    .unwrap();

    let mut session = ChatSession::new();
    let mut shown = String::new();
    let result = chat
        .converse(&mut session, "hello", true, false, |f| shown.push_str(f))
        .await;

    assert!(matches!(result, Err(Error::Llm(_))));
    assert_eq!(shown, "The answer is");
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_chat_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .respond_with(ResponseTemplate::new(401).set_body_string("NotAuthenticated"))
        .mount(&server)
        .await;

    let client = chat_client(&server, GenerationConfig::default());
    let err = client.generate("q").await.unwrap_err();

    assert!(matches!(err, Error::Llm(_)));
    assert!(err.to_string().contains("401"));
    assert!(client.generate_stream("q").await.is_err());
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let client = OciChatClient::new(
        "http://127.0.0.1:9",
        COMPARTMENT,
        GenerationConfig::default(),
        Arc::new(NoAuth),
    )
    .unwrap();

    assert!(client.generate("q").await.is_err());
    assert!(client.generate_stream("q").await.is_err());
    assert!(!client.health_check().await.unwrap());
    assert!(probe_endpoint(&reqwest::Client::new(), "http://127.0.0.1:9").await.is_err());
}

#[tokio::test]
async fn test_connect_fails_on_unreachable_endpoint() {
    let connection = ConnectionConfig {
        username: "admin".to_string(),
        password: "secret".to_string(),
        dsn: "mydb_high".to_string(),
        config_dir: None,
        wallet_dir: None,
        wallet_password: None,
        table_name: "DOCS".to_string(),
        compartment_id: COMPARTMENT.to_string(),
        service_endpoint: "http://127.0.0.1:9".to_string(),
    };

    let result = RagChat::connect(
        &connection,
        Arc::new(NoAuth),
        GenerationConfig::default(),
        RetrievalConfig::default(),
    )
    .await;

    let Err(err) = result else {
        panic!("connect succeeded against an unreachable endpoint");
    };
    assert!(matches!(err, Error::Llm(_)));
    assert!(err.to_string().contains("unreachable"));
}

#[tokio::test]
async fn test_probe_accepts_any_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(probe_endpoint(&reqwest::Client::new(), &server.uri()).await.is_ok());
}

#[tokio::test]
async fn test_embed_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/embedText"))
        .and(body_partial_json(json!({
            "inputs": ["What is a vector?"],
            "servingMode": {"modelId": "cohere.embed-multilingual-v3.0"},
            "compartmentId": COMPARTMENT,
            "inputType": "SEARCH_QUERY"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.25, -0.5, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OciEmbedder::new(server.uri(), COMPARTMENT, Arc::new(NoAuth)).unwrap();
    assert_eq!(embedder.embed("What is a vector?").await.unwrap(), vec![0.25, -0.5, 1.0]);
    assert_eq!(embedder.dimensions(), 1024);
}

#[tokio::test]
async fn test_embed_count_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/embedText"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": []})))
        .mount(&server)
        .await;

    let embedder = OciEmbedder::new(server.uri(), COMPARTMENT, Arc::new(NoAuth)).unwrap();
    assert!(matches!(embedder.embed("q").await, Err(Error::Embedding(_))));
}

#[tokio::test]
async fn test_grounded_turn_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/20231130/actions/chat"))
        .and(body_string_contains(common::PASSAGES[0]))
        .and(body_string_contains(common::PASSAGES[1]))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&["Grounded ", "answer."], "Grounded answer."),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let h = common::harness("unused", false, false);
    let base = chat_client(&server, GenerationConfig::default());
    let factory: LlmFactory = Arc::new(move |g: &GenerationConfig| {
        let llm: Arc<dyn LlmProvider> = Arc::new(base.with_generation(g.clone())?);
        Ok(llm)
    });

    let chat = RagChat::from_parts(
        factory,
        h.retriever.clone(),
        GenerationConfig::default(),
        RetrievalConfig { enabled: true, fetch_k: 2 },
    )
    .unwrap();

    let mut session = ChatSession::new();
    let mut fragments = Vec::new();
    let answer = chat
        .converse(&mut session, "Tell me about vectors", true, true, |f| fragments.push(f.to_string()))
        .await
        .unwrap();

    assert_eq!(answer, "Grounded answer.");
    assert_eq!(fragments, vec!["Grounded ", "answer."]);
    assert_eq!(session.len(), 2);
}
