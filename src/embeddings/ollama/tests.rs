use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::new("/tmp/ayurbot-tests");
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = server.address().port();
    config
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&config_for(server)).expect("Failed to create client")
}

#[test]
fn client_configuration() {
    let mut config = Config::new("/tmp/ayurbot-tests");
    config.ollama.host = "test-host".to_string();
    config.ollama.port = 1234;
    config.ollama.chat_model = "llama3".to_string();
    config.ollama.retry_attempts = 3;

    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.chat_model, "llama3");
    assert_eq!(client.embedding_model, "all-minilm");
    assert_eq!(client.max_tokens, 100);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 3);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&Config::new("/tmp/ayurbot-tests"))
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(0);

    assert_eq!(client.timeout, Duration::from_secs(60));
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn timeouts_map_to_generation_timeout() {
    let error = OllamaError::Timeout(Duration::from_secs(120)).into_generation_error();
    assert!(matches!(
        error,
        AyurbotError::GenerationTimeout { seconds: 120 }
    ));

    let error = OllamaError::Status(503).into_generation_error();
    assert!(matches!(error, AyurbotError::GenerationUnavailable(_)));
}

#[tokio::test]
async fn completion_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "mistral",
            "stream": false,
            "options": { "num_predict": 100 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral",
            "response": "  Favor warm, cooked meals.  ",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let answer = client
        .complete("The user has a vata dosha constitution.")
        .await
        .expect("completion should succeed");

    assert_eq!(answer, "Favor warm, cooked meals.");
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.complete("prompt").await;

    assert!(matches!(
        result,
        Err(AyurbotError::GenerationUnavailable(_))
    ));
}

#[tokio::test]
async fn slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "late", "done": true }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).with_timeout(Duration::from_millis(200));
    let result = client.complete("prompt").await;

    assert!(
        matches!(result, Err(AyurbotError::GenerationTimeout { .. })),
        "unexpected result: {:?}",
        result
    );
}

#[tokio::test]
async fn malformed_completion_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.complete("prompt").await;

    assert!(matches!(
        result,
        Err(AyurbotError::GenerationUnavailable(message)) if message.contains("Unexpected response")
    ));
}

#[tokio::test]
async fn embedding_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({
            "model": "all-minilm",
            "input": "warming spices"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "all-minilm",
            "embeddings": [[0.1, 0.2, 0.3]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let embedding = tokio::task::spawn_blocking(move || client.generate_embedding("warming spices"))
        .await
        .expect("task should join")
        .expect("embedding should succeed");

    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn empty_embedding_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.generate_embedding("anything"))
        .await
        .expect("task should join");

    assert!(matches!(result, Err(OllamaError::InvalidResponse(_))));
}

#[tokio::test]
async fn health_check_accepts_implicit_latest_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "mistral:latest" },
                { "name": "all-minilm:latest", "size": 45_000_000 }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should join");

    assert!(result.is_ok(), "health check failed: {:?}", result);
}

#[tokio::test]
async fn health_check_reports_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [ { "name": "mistral:latest" } ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should join");

    let message = format!("{:#}", result.expect_err("embedding model is missing"));
    assert!(message.contains("all-minilm"));
}

#[test]
fn unreachable_server_is_unavailable() {
    let mut config = Config::new("/tmp/ayurbot-tests");
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = 9;
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(2));

    let result = client.ping();
    assert!(matches!(
        result,
        Err(OllamaError::Unavailable(_) | OllamaError::Timeout(_))
    ));
}
