//! A research assistant that lets a local chat model search the web and read
//! pages.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with an Ollama client.
//! - An extractor for `{"tool_call": ...}` objects embedded in free-form replies.
//! - Two capabilities, web search and page reading, behind a `Toolbox`.
//! - An `Agent` that loops between the model and the toolbox until the model
//!   answers in plain text.

pub mod agent;
pub mod config;
mod error;
pub mod extract;
mod hooks;
pub mod llm;
mod memory;
mod message;
pub mod telemetry;
pub mod tools;

pub use agent::{default_system_prompt, Agent, DEFAULT_MAX_TOOL_ROUNDS};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use extract::extract_tool_call;
pub use hooks::{AgentHook, ConsoleHook};
pub use llm::{LanguageModel, OllamaClient, StubModel};
pub use memory::ConversationMemory;
pub use message::{Message, Role, ToolCallRequest, ToolResult};
pub use telemetry::{init_tracing, TelemetryCollector, TelemetryEvent};
pub use tools::{Capability, ChromiumRenderer, PageReader, PageRenderer, SearchClient, SearchResult, Toolbox};
