//! Ollama client against a stand-in chat endpoint.

use chikoro_agent::llm::{self, EMPTY_RESPONSE};
use chikoro_agent::{LanguageModel, Message, OllamaClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn conversation() -> Vec<Message> {
    vec![Message::system("You are a helpful research assistant."), Message::user("hi")]
}

#[tokio::test]
async fn sends_full_conversation_without_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "chikoro-ai",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are a helpful research assistant."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "chikoro-ai",
            "message": {"role": "assistant", "content": "Hello there."},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "chikoro-ai").unwrap();
    let reply = client.complete_chat(&conversation()).await.unwrap();

    assert_eq!(reply, "Hello there.");
}

#[tokio::test]
async fn missing_content_yields_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "chikoro-ai").unwrap();

    assert_eq!(client.complete_chat(&conversation()).await.unwrap(), EMPTY_RESPONSE);
}

#[tokio::test]
async fn endpoint_failure_becomes_diagnostic_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "chikoro-ai").unwrap();

    let err = client.complete_chat(&conversation()).await.unwrap_err();
    assert!(err.to_string().contains("model not loaded"));

    let reply = llm::query(&client, &conversation()).await;
    assert_eq!(reply, llm::connection_error(client.endpoint()));
    assert!(reply.contains("/api/chat"));
}

#[tokio::test]
async fn unreachable_endpoint_becomes_diagnostic_text() {
    let client = OllamaClient::new("http://127.0.0.1:9", "chikoro-ai").unwrap();
    let reply = llm::query(&client, &conversation()).await;
    assert_eq!(reply, "Error: Could not connect to the model at http://127.0.0.1:9/api/chat.");
}
