//! Streaming and chat tests against a wiremock server.

use futures_util::StreamExt;
use gemini_connector::{ChatMessage, ChatRole, Client, Error, GeminiConfig};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-pro:generateContent";
const STREAM_PATH: &str = "/models/gemini-pro:streamGenerateContent";

#[derive(Clone)]
struct SequenceResponder {
    templates: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<ResponseTemplate>>>,
}

impl SequenceResponder {
    fn new(templates: Vec<ResponseTemplate>) -> Self {
        Self {
            templates: std::sync::Arc::new(std::sync::Mutex::new(templates.into_iter().collect())),
        }
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, _req: &Request) -> ResponseTemplate {
        let mut templates = self.templates.lock().expect("mutex should not be poisoned");
        templates.pop_front().unwrap_or_else(|| {
            ResponseTemplate::new(500).set_body_json(json!({
                "error": { "message": "No more mock responses configured" }
            }))
        })
    }
}

fn client_for(server: &MockServer) -> Client {
    let config = GeminiConfig {
        retry_attempts: 1,
        ..GeminiConfig::new("test-key")
    };
    Client::with_base_url(config, server.uri()).expect("client creation should succeed")
}

fn reply_body(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
}

fn sse_body(texts: &[&str]) -> String {
    texts
        .iter()
        .map(|text| {
            let chunk = json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": text }] }
                }]
            });
            format!("data: {chunk}\r\n\r\n")
        })
        .collect()
}

#[tokio::test]
async fn stream_yields_chunks_in_order_and_filters_empties() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["Hello", "", " world"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut stream = client
        .generate_text_stream("greet")
        .await
        .expect("stream should open");

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("chunk"));
    }

    assert_eq!(chunks, vec!["Hello".to_string(), " world".to_string()]);
}

#[tokio::test]
async fn stream_with_no_chunks_is_empty_not_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut stream = client
        .generate_text_stream("quiet")
        .await
        .expect("stream should open");

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn stream_open_failure_propagates_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "Internal error", "status": "INTERNAL" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate_text_stream("fail")
        .await
        .expect_err("open should fail");
    assert!(matches!(err, Error::Api(_)));

    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 1, "streaming is never retried");
}

#[tokio::test]
async fn chat_replays_history_then_sends_final_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(SequenceResponder::new(vec![
            reply_body("Hi there!"),
            reply_body("Doing great."),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let messages = [ChatMessage::user("hi"), ChatMessage::user("how are you")];
    let result = client
        .chat_conversation(&messages)
        .await
        .expect("chat should succeed");

    assert_eq!(result.text, "Doing great.");

    // Replay order: first request carries only "hi"; the second carries the
    // accumulated transcript plus the final message.
    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 2);

    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("first body");
    let contents = first["contents"].as_array().expect("contents array");
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["parts"][0]["text"], "hi");

    let second: serde_json::Value =
        serde_json::from_slice(&requests[1].body).expect("second body");
    let contents = second["contents"].as_array().expect("contents array");
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["parts"][0]["text"], "hi");
    assert_eq!(contents[1]["parts"][0]["text"], "Hi there!");
    assert_eq!(contents[2]["parts"][0]["text"], "how are you");

    // History comes from the session transcript, alternating by position.
    let roles: Vec<ChatRole> = result.history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::User, ChatRole::Model, ChatRole::User, ChatRole::Model]
    );
    let texts: Vec<&str> = result.history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, vec!["hi", "Hi there!", "how are you", "Doing great."]);
}

#[tokio::test]
async fn chat_skips_non_user_history_during_replay() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(SequenceResponder::new(vec![
            reply_body("ack"),
            reply_body("final answer"),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let messages = [
        ChatMessage::user("question one"),
        ChatMessage::model("a model turn the caller supplied"),
        ChatMessage::user("question two"),
    ];
    let result = client
        .chat_conversation(&messages)
        .await
        .expect("chat should succeed");

    assert_eq!(result.text, "final answer");

    // The supplied model turn is never replayed; only two sends happen.
    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn chat_requires_at_least_one_message() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client
        .chat_conversation(&[])
        .await
        .expect_err("empty conversation should fail");
    assert!(matches!(err, Error::InvalidRequest(_)));

    let requests = server.received_requests().await.expect("requests recorded");
    assert!(requests.is_empty(), "no request should be sent");
}

#[tokio::test]
async fn chat_failure_aborts_whole_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(SequenceResponder::new(vec![
            reply_body("first reply"),
            ResponseTemplate::new(500).set_body_json(json!({
                "error": { "code": 500, "message": "Internal error", "status": "INTERNAL" }
            })),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let messages = [ChatMessage::user("one"), ChatMessage::user("two")];
    let err = client
        .chat_conversation(&messages)
        .await
        .expect_err("second send should abort the call");
    assert!(matches!(err, Error::Api(_)));

    // No retry wrapping on the chat path: one request per send, then stop.
    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 2);
}
