use super::*;
use crate::config::Config;
use crate::database::PassageRecord;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn knowledge_base(server: &MockServer, temp_dir: &TempDir) -> KnowledgeBase {
    let mut config = Config::new(temp_dir.path());
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = server.address().port();
    config.ollama.embedding_dimension = 3;

    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");
    store
        .store_passages(vec![
            PassageRecord::new(vec![1.0, 0.0, 0.0], "Favor warm, moist foods.")
                .with_source("ayurveda.pdf", Some(12)),
            PassageRecord::new(vec![0.0, 1.0, 0.0], "Avoid spicy meals at noon.")
                .with_source("ayurveda.pdf", Some(30)),
            PassageRecord::new(vec![0.0, 0.0, 1.0], "Wake before sunrise."),
        ])
        .await
        .expect("should store passages");

    let client = OllamaClient::new(&config).expect("should create client");
    KnowledgeBase::new(client, Arc::new(store))
}

async fn mock_embedding(server: &MockServer, embedding: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [embedding]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn search_returns_top_k_passages_in_order() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    mock_embedding(&server, json!([0.9, 0.2, 0.0])).await;
    let kb = knowledge_base(&server, &temp_dir).await;

    let passages = kb
        .search("What foods help me?", 2)
        .await
        .expect("search should succeed");

    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].text, "Favor warm, moist foods.");
    assert_eq!(passages[0].page, Some(12));
    assert_eq!(passages[1].text, "Avoid spicy meals at noon.");
}

#[tokio::test]
async fn embedding_failure_is_retrieval_unavailable() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let kb = knowledge_base(&server, &temp_dir).await;

    let result = kb.search("anything", 2).await;

    assert!(matches!(result, Err(AyurbotError::RetrievalUnavailable(_))));
}

#[tokio::test]
async fn wrong_embedding_dimension_is_retrieval_unavailable() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    mock_embedding(&server, json!([0.1, 0.2])).await;
    let kb = knowledge_base(&server, &temp_dir).await;

    let result = kb.search("anything", 2).await;

    assert!(matches!(
        result,
        Err(AyurbotError::RetrievalUnavailable(message)) if message.contains("dimensions")
    ));
}
