//! Connection validation and model introspection tests.
//!
//! Both operations promise to never surface an error: the health check
//! collapses every failure into `false`, and the model query into a
//! sentinel report.

use gemini_connector::{Client, GeminiConfig, ModelInfoReport};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-pro:generateContent";

fn client_for(server: &MockServer) -> Client {
    let config = GeminiConfig {
        retry_attempts: 1,
        ..GeminiConfig::new("test-key")
    };
    Client::with_base_url(config, server.uri()).expect("client creation should succeed")
}

fn unreachable_client() -> Client {
    // Nothing listens on this port; every request fails at the transport.
    Client::with_base_url(GeminiConfig::new("test-key"), "http://127.0.0.1:9")
        .expect("client creation should succeed")
}

fn models_body() -> serde_json::Value {
    json!({
        "models": [
            {
                "name": "models/gemini-1.5-flash",
                "displayName": "Gemini 1.5 Flash",
                "description": "Fast multimodal model",
                "inputTokenLimit": 1048576,
                "outputTokenLimit": 8192,
                "supportedGenerationMethods": ["generateContent", "countTokens"],
                "temperature": 1.0,
                "topP": 0.95,
                "topK": 64
            },
            {
                "name": "models/gemini-pro",
                "displayName": "Gemini Pro",
                "description": "Text generation model",
                "inputTokenLimit": 30720,
                "outputTokenLimit": 2048,
                "supportedGenerationMethods": ["generateContent"],
                "temperature": 0.9,
                "topP": 1.0,
                "topK": 1
            }
        ]
    })
}

#[tokio::test]
async fn validate_connection_true_on_text_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Yes, working." }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.validate_connection().await);
}

#[tokio::test]
async fn validate_connection_false_on_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(!client.validate_connection().await);

    // One probe only; the health check never retries.
    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn validate_connection_false_on_empty_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(!client.validate_connection().await);
}

#[tokio::test]
async fn validate_connection_false_on_transport_failure() {
    assert!(!unreachable_client().validate_connection().await);
}

#[tokio::test]
async fn model_info_finds_configured_model_by_suffix() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.model_info().await {
        ModelInfoReport::Found(info) => {
            assert_eq!(info.name, "models/gemini-pro");
            assert_eq!(info.display_name, "Gemini Pro");
            assert_eq!(info.input_token_limit, Some(30720));
            assert_eq!(info.output_token_limit, Some(2048));
            assert_eq!(
                info.supported_generation_methods,
                vec!["generateContent".to_string()]
            );
            assert_eq!(info.top_k, Some(1));
        }
        ModelInfoReport::Error { error } => panic!("expected model info, got error: {error}"),
    }
}

#[tokio::test]
async fn model_info_returns_sentinel_when_model_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "models/some-other-model" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.model_info().await {
        ModelInfoReport::Error { error } => {
            assert_eq!(error, "model information not found");
        }
        ModelInfoReport::Found(info) => panic!("expected sentinel, got {info:?}"),
    }
}

#[tokio::test]
async fn model_info_returns_sentinel_on_api_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "Internal error", "status": "INTERNAL" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.model_info().await {
        ModelInfoReport::Error { error } => assert!(error.contains("Internal error")),
        ModelInfoReport::Found(info) => panic!("expected sentinel, got {info:?}"),
    }
}

#[tokio::test]
async fn model_info_returns_sentinel_on_transport_failure() {
    match unreachable_client().model_info().await {
        ModelInfoReport::Error { error } => assert!(!error.is_empty()),
        ModelInfoReport::Found(info) => panic!("expected sentinel, got {info:?}"),
    }
}
