use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Message, ToolCallRequest, ToolResult};

/// Observation points around each model query and tool call. Returning an
/// error aborts the current `respond` call.
#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn before_model(&self, _messages: &[Message]) -> Result<()> {
        Ok(())
    }

    async fn after_model(&self, _raw_response: &str) -> Result<()> {
        Ok(())
    }

    async fn before_tool_call(&self, _call: &ToolCallRequest) -> Result<()> {
        Ok(())
    }

    async fn after_tool_result(&self, _result: &ToolResult) -> Result<()> {
        Ok(())
    }
}

/// Prints progress lines for an interactive session.
pub struct ConsoleHook;

#[async_trait]
impl AgentHook for ConsoleHook {
    async fn before_model(&self, _messages: &[Message]) -> Result<()> {
        println!("🤔 Querying model...");
        Ok(())
    }

    async fn after_model(&self, raw_response: &str) -> Result<()> {
        println!("\n🤖 Model:\n{raw_response}\n");
        Ok(())
    }

    async fn before_tool_call(&self, call: &ToolCallRequest) -> Result<()> {
        println!(
            "🛠️  [TOOL] {} {}",
            call.name,
            serde_json::Value::Object(call.args.clone())
        );
        Ok(())
    }

    async fn after_tool_result(&self, result: &ToolResult) -> Result<()> {
        let summary = match &result.payload {
            serde_json::Value::Array(items) => format!("{} results", items.len()),
            serde_json::Value::String(text) => format!("{} characters", text.chars().count()),
            other => other.to_string(),
        };
        println!("✅  [TOOL] {} returned {summary}", result.name);
        Ok(())
    }
}
