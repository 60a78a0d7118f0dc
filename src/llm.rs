//! Language model abstraction and the Ollama chat client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::message::Message;

/// Reply used when the endpoint answers without a `message.content` field.
pub const EMPTY_RESPONSE: &str = "Error: Empty response from model.";

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends the whole conversation and returns the raw reply text.
    async fn complete_chat(&self, messages: &[Message]) -> Result<String>;

    /// Human-readable location of the model, used in diagnostics.
    fn endpoint(&self) -> &str;
}

/// Queries the model without ever failing: transport and endpoint errors are
/// turned into a diagnostic sentence the agent loop treats as a final answer.
pub async fn query<M: LanguageModel + ?Sized>(model: &M, messages: &[Message]) -> String {
    match model.complete_chat(messages).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(endpoint = model.endpoint(), error = %err, "model query failed");
            connection_error(model.endpoint())
        }
    }
}

pub fn connection_error(endpoint: &str) -> String {
    format!("Error: Could not connect to the model at {endpoint}.")
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama Client (Local LLM)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Ollama `/api/chat` client, non-streaming.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    chat_url: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(host, model, Duration::from_secs(300))
    }

    pub fn with_timeout(
        host: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = host.into().trim_end_matches('/').to_string();
        Ok(Self {
            // Local models can be slow to load on first use.
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| AgentError::LanguageModel(format!("http client error: {err}")))?,
            model: model.into(),
            chat_url: format!("{base_url}/api/chat"),
            base_url,
        })
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        Self::with_timeout(
            cfg.host.clone(),
            cfg.model.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete_chat(&self, messages: &[Message]) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            stream: false,
            messages,
        };
        debug!(model = %self.model, messages = messages.len(), "posting chat request");

        let resp = self
            .http
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::LanguageModel(format!("Ollama request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "Ollama"));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::LanguageModel(format!("Ollama parse error: {e}")))?;

        Ok(parsed
            .message
            .and_then(|m| m.content)
            .unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.chat_url
    }
}

/// A deterministic model used for tests and demos. Replies are handed out in
/// order and every conversation it receives is kept for inspection.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            received: Mutex::new(Vec::new()),
        })
    }

    /// Snapshots of the conversation passed to each call, oldest first.
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(&self, messages: &[Message]) -> Result<String> {
        if let Ok(mut seen) = self.received.lock() {
            seen.push(messages.to_vec());
        }
        let mut locked = self
            .responses
            .lock()
            .map_err(|_| AgentError::LanguageModel("StubModel poisoned".into()))?;
        locked.pop_front().ok_or_else(|| {
            AgentError::LanguageModel("StubModel ran out of scripted responses".into())
        })
    }

    fn endpoint(&self) -> &str {
        "stub://model"
    }
}
