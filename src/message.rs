use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// Key of the envelope a tool result is wrapped in before it enters the
/// conversation.
pub const TOOL_RESULT_KEY: &str = "tool_result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation entry, serialized exactly as the chat endpoint
/// expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation requested by the model inside its free-form reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCallRequest {
    pub name: String,
    pub args: Map<String, Value>,
}

/// Output of a capability, fed back to the model as a user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub name: String,
    pub payload: Value,
}

impl ToolResult {
    pub fn new(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Pretty-printed `{"tool_result": <payload>}` envelope.
    pub fn to_content(&self) -> String {
        let mut envelope = Map::new();
        envelope.insert(TOOL_RESULT_KEY.to_string(), self.payload.clone());
        serde_json::to_string_pretty(&Value::Object(envelope))
            .unwrap_or_else(|_| self.payload.to_string())
    }

    pub fn to_message(&self) -> Message {
        Message::user(self.to_content())
    }

    /// Recovers the payload of a message produced by [`ToolResult::to_message`].
    pub fn payload_from_message(message: &Message) -> Result<Value> {
        let mut envelope: Map<String, Value> = serde_json::from_str(&message.content)?;
        envelope.remove(TOOL_RESULT_KEY).ok_or_else(|| {
            AgentError::Protocol(format!("message carries no `{TOOL_RESULT_KEY}` envelope"))
        })
    }
}
