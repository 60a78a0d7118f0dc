//! Whole turns through the agent with stand-in model, search and browser.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chikoro_agent::{
    Agent, AgentError, Message, OllamaClient, PageReader, PageRenderer, Result, Role,
    SearchClient, TelemetryCollector, ToolResult, Toolbox,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PAGE: &str = r#"<html><body>
<table><tr><td>header</td></tr></table>
<table><tr><td>filters</td></tr></table>
<table>
  <tr><td><a href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FHarare&amp;rut=1">Harare - Wikipedia</a></td></tr>
</table>
</body></html>"#;

const EMPTY_SEARCH_PAGE: &str = "<html><body><table></table><table></table></body></html>";

struct ArticleRenderer;

#[async_trait]
impl PageRenderer for ArticleRenderer {
    async fn render(&self, _url: &str, _timeout: Duration) -> Result<String> {
        Ok("<html><body><nav>Menu</nav><p>Harare is the capital of Zimbabwe.</p></body></html>"
            .to_string())
    }
}

struct BlockedRenderer;

#[async_trait]
impl PageRenderer for BlockedRenderer {
    async fn render(&self, _url: &str, _timeout: Duration) -> Result<String> {
        Err(AgentError::Browser("net::ERR_BLOCKED_BY_CLIENT".into()))
    }
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "chikoro-ai",
        "message": {"role": "assistant", "content": content},
        "done": true
    }))
}

async fn mount_search(server: &MockServer, page: &str) {
    Mock::given(method("GET"))
        .and(path("/lite/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
}

async fn mount_reply_once(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply(content))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

fn agent_for(
    model_server: &MockServer,
    search_server: &MockServer,
    renderer: Arc<dyn PageRenderer>,
) -> Agent<OllamaClient> {
    let model = Arc::new(OllamaClient::new(model_server.uri(), "chikoro-ai").unwrap());
    let search = SearchClient::new(search_server.uri(), Duration::from_secs(2)).unwrap();
    Agent::new(model, Toolbox::new(search, PageReader::new(renderer)))
}

/// Conversations posted to the chat endpoint, in order.
async fn chat_requests(server: &MockServer) -> Vec<Vec<Message>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/api/chat")
        .map(|request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            serde_json::from_value(body["messages"].clone()).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn search_then_answer() {
    let model_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    mount_search(&search_server, SEARCH_PAGE).await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("tool_result"))
        .respond_with(chat_reply("The capital of Zimbabwe is Harare."))
        .with_priority(1)
        .mount(&model_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply(
            r#"{"tool_call": {"name": "search", "args": {"query": "capital of Zimbabwe"}}}"#,
        ))
        .mount(&model_server)
        .await;

    let mut agent = agent_for(&model_server, &search_server, Arc::new(ArticleRenderer));
    let answer = agent.respond("What is the capital of Zimbabwe?").await.unwrap();

    assert_eq!(answer, "The capital of Zimbabwe is Harare.");

    let requests = chat_requests(&model_server).await;
    assert_eq!(requests.len(), 2);
    let result = requests[1].last().unwrap();
    assert_eq!(result.role, Role::User);
    assert_eq!(
        ToolResult::payload_from_message(result).unwrap(),
        json!([{"title": "Harare - Wikipedia", "url": "https://en.wikipedia.org/wiki/Harare"}])
    );
}

#[tokio::test]
async fn empty_search_is_reported_as_empty_list() {
    let model_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    mount_search(&search_server, EMPTY_SEARCH_PAGE).await;
    mount_reply_once(
        &model_server,
        r#"{"tool_call": {"name": "search", "args": {"query": "zxqv nothing"}}}"#,
    )
    .await;
    mount_reply_once(&model_server, "I could not find anything about that.").await;

    let mut agent = agent_for(&model_server, &search_server, Arc::new(ArticleRenderer));
    let answer = agent.respond("zxqv nothing").await.unwrap();

    assert_eq!(answer, "I could not find anything about that.");
    let requests = chat_requests(&model_server).await;
    let result = requests[1].last().unwrap();
    assert_eq!(ToolResult::payload_from_message(result).unwrap(), json!([]));
}

#[tokio::test]
async fn search_read_answer_keeps_call_result_pairs() {
    let model_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    mount_search(&search_server, SEARCH_PAGE).await;
    mount_reply_once(
        &model_server,
        r#"Let me look. {"tool_call": {"name": "search", "args": {"query": "capital of Zimbabwe"}}}"#,
    )
    .await;
    mount_reply_once(
        &model_server,
        r#"{"tool_call": {"name": "scrape_and_read", "args": {"url": "https://en.wikipedia.org/wiki/Harare"}}}"#,
    )
    .await;
    mount_reply_once(&model_server, "Harare.").await;

    let telemetry = TelemetryCollector::default();
    let mut agent = agent_for(&model_server, &search_server, Arc::new(ArticleRenderer))
        .with_telemetry(telemetry.clone());
    let answer = agent.respond("What is the capital of Zimbabwe?").await.unwrap();
    assert_eq!(answer, "Harare.");

    let transcript = agent.transcript();
    let roles: Vec<Role> = transcript.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
    for pair in [(2, 3), (4, 5)] {
        assert!(transcript[pair.0].content.contains("tool_call"));
        assert!(ToolResult::payload_from_message(&transcript[pair.1]).is_ok());
    }
    assert_eq!(
        ToolResult::payload_from_message(&transcript[5]).unwrap(),
        json!("Harare is the capital of Zimbabwe.")
    );
    assert_eq!(
        telemetry.kinds().iter().filter(|k| k.as_str() == "tool_call").count(),
        2
    );
}

#[tokio::test]
async fn page_failure_reaches_the_model_as_text() {
    let model_server = MockServer::start().await;
    let search_server = MockServer::start().await;
    mount_reply_once(
        &model_server,
        r#"{"tool_call": {"name": "scrape_and_read", "args": {"url": "https://example.com"}}}"#,
    )
    .await;
    mount_reply_once(&model_server, "That page is blocked.").await;

    let mut agent = agent_for(&model_server, &search_server, Arc::new(BlockedRenderer));
    let answer = agent.respond("Read example.com").await.unwrap();

    assert_eq!(answer, "That page is blocked.");
    let requests = chat_requests(&model_server).await;
    let payload = ToolResult::payload_from_message(requests[1].last().unwrap()).unwrap();
    let text = payload.as_str().unwrap();
    assert!(text.starts_with("Failed to retrieve content."));
    assert!(text.contains("ERR_BLOCKED_BY_CLIENT"));
}

#[tokio::test]
async fn unreachable_model_ends_turn_with_diagnostic() {
    let search_server = MockServer::start().await;
    let model = Arc::new(OllamaClient::new("http://127.0.0.1:9", "chikoro-ai").unwrap());
    let search = SearchClient::new(search_server.uri(), Duration::from_secs(2)).unwrap();
    let mut agent = Agent::new(model, Toolbox::new(search, PageReader::new(Arc::new(ArticleRenderer))));

    let answer = agent.respond("hello").await.unwrap();

    assert_eq!(answer, "Error: Could not connect to the model at http://127.0.0.1:9/api/chat.");
    assert_eq!(agent.transcript().len(), 3);
}
