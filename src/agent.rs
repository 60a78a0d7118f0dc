use std::sync::Arc;

use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::extract::extract_tool_call;
use crate::hooks::AgentHook;
use crate::llm::{self, LanguageModel};
use crate::memory::ConversationMemory;
use crate::message::{Message, ToolCallRequest};
use crate::telemetry::TelemetryCollector;
use crate::tools::{Capability, Toolbox};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Sent when the model keeps asking for tools after the round budget is spent.
pub const FORCE_ANSWER_PROMPT: &str = "You have used all available tool calls. Answer the \
    original question now using only the information gathered so far. Do not call any tool.";

/// Research-assistant instructions listing every capability and the exact
/// markup expected for a tool call.
pub fn default_system_prompt() -> String {
    let mut prompt = String::from(
        "You are a helpful research assistant. Your goal is to answer user questions \
         accurately by searching the web.\n\n",
    );
    prompt.push_str("You have access to the following tools:\n");
    for (index, capability) in Capability::ALL.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. `{}`: {}\n",
            index + 1,
            capability.signature(),
            capability.description()
        ));
    }
    prompt.push_str(
        "\nHere is your workflow:\n\
         1. The user will ask a question. First, use the `search` tool to find relevant web pages.\n\
         2. Review the search results. Choose the most promising URL to investigate further.\n\
         3. Use the `scrape_and_read` tool with that URL to get the page content.\n\
         4. Finally, answer the user's question based on the information you have gathered.\n\n\
         To call a tool, you MUST output ONLY a JSON object in this exact format:\n\
         {\"tool_call\": {\"name\": \"tool_name\", \"args\": {\"arg_name\": \"value\"}}}\n",
    );
    prompt
}

#[derive(Debug, Clone, PartialEq)]
enum AgentState {
    AwaitingReply,
    ExecutingTool {
        capability: Capability,
        request: ToolCallRequest,
    },
    Done(String),
}

/// Drives the model through search and page-read rounds until it answers.
pub struct Agent<M: LanguageModel> {
    model: Arc<M>,
    toolbox: Toolbox,
    memory: ConversationMemory,
    max_tool_rounds: usize,
    hooks: Vec<Arc<dyn AgentHook>>,
    telemetry: Option<TelemetryCollector>,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>, toolbox: Toolbox) -> Self {
        Self {
            model,
            toolbox,
            memory: ConversationMemory::new(default_system_prompt()),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            hooks: Vec::new(),
            telemetry: None,
        }
    }

    /// Replaces the system instruction and starts a fresh conversation.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.memory = ConversationMemory::new(prompt);
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn transcript(&self) -> &[Message] {
        self.memory.messages()
    }

    /// Runs one user turn to completion and returns the final answer.
    ///
    /// Model, search and page failures never surface here; they become text
    /// in the conversation. Only hook errors are propagated.
    pub async fn respond(&mut self, user_input: impl Into<String>) -> Result<String> {
        let span = info_span!("agent_turn", run_id = %Uuid::new_v4());
        self.run(user_input.into()).instrument(span).await
    }

    async fn run(&mut self, user_input: String) -> Result<String> {
        self.memory.push(Message::user(user_input));
        let mut state = AgentState::AwaitingReply;
        let mut rounds = 0usize;

        loop {
            state = match state {
                AgentState::AwaitingReply => {
                    let reply = self.query_model().await?;
                    match self.actionable_call(&reply) {
                        None => AgentState::Done(reply),
                        Some(_) if rounds >= self.max_tool_rounds => {
                            warn!(rounds, "tool round budget exhausted, forcing an answer");
                            return self.force_answer().await;
                        }
                        Some((capability, request)) => {
                            self.memory.push(Message::assistant(reply));
                            AgentState::ExecutingTool {
                                capability,
                                request,
                            }
                        }
                    }
                }
                AgentState::ExecutingTool {
                    capability,
                    request,
                } => {
                    rounds += 1;
                    self.execute(capability, &request).await?;
                    AgentState::AwaitingReply
                }
                AgentState::Done(answer) => {
                    info!(rounds, "agent produced final answer");
                    self.memory.push(Message::assistant(answer.clone()));
                    return Ok(answer);
                }
            };
        }
    }

    async fn query_model(&self) -> Result<String> {
        let snapshot = self.memory.messages();
        for hook in &self.hooks {
            hook.before_model(snapshot).await?;
        }
        let reply = llm::query(self.model.as_ref(), snapshot).await;
        for hook in &self.hooks {
            hook.after_model(&reply).await?;
        }
        self.record("model_reply", json!({"chars": reply.chars().count()}));
        Ok(reply)
    }

    /// A reply acts only when it embeds a call to a known capability; an
    /// unknown name makes the reply the final answer.
    fn actionable_call(&self, reply: &str) -> Option<(Capability, ToolCallRequest)> {
        let request = extract_tool_call(reply)?;
        match self.toolbox.resolve(&request) {
            Some(capability) => {
                info!(tool = %request.name, "tool call detected");
                Some((capability, request))
            }
            None => {
                info!(tool = %request.name, "unknown tool requested, treating reply as answer");
                self.record("unknown_tool", json!({"tool": request.name}));
                None
            }
        }
    }

    async fn execute(&mut self, capability: Capability, request: &ToolCallRequest) -> Result<()> {
        for hook in &self.hooks {
            hook.before_tool_call(request).await?;
        }
        self.record(
            "tool_call",
            json!({"tool": capability.name(), "args": request.args}),
        );

        let result = self.toolbox.dispatch(capability, &request.args).await;

        for hook in &self.hooks {
            hook.after_tool_result(&result).await?;
        }
        let message = result.to_message();
        self.record(
            "tool_result",
            json!({"tool": result.name, "chars": message.content.chars().count()}),
        );
        self.memory.push(message);
        Ok(())
    }

    async fn force_answer(&mut self) -> Result<String> {
        self.record("forced_answer", json!({"max_tool_rounds": self.max_tool_rounds}));
        self.memory.push(Message::user(FORCE_ANSWER_PROMPT));
        let answer = self.query_model().await?;
        self.memory.push(Message::assistant(answer.clone()));
        Ok(answer)
    }

    fn record(&self, kind: &str, detail: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(kind, detail);
        }
    }
}
