//! The tool-calling session loop.
//!
//! # Algorithm
//! 1. Send system instructions, history and tool definitions to the model
//! 2. If the model proposes tool calls, gate and execute them concurrently,
//!    append the results in proposal order, and go back to 1
//! 3. Otherwise the model's text is the final answer

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

use super::gate::{GateDecision, ToolGate};
use super::types::{AgentOutcome, OrchestrationError, ToolInvocation};
use crate::llm::{ChatMessage, LlmClient, Role, TokenUsage, ToolCall};
use crate::tools::{FailureKind, ToolRegistry, ToolResult};

/// Default bound on completion requests per session.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Placeholder answer when the model finishes without any text.
const EMPTY_ANSWER: &str = "No response received";

enum SessionState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
}

/// Runs one conversation against a fixed tool registry.
///
/// The orchestrator itself is immutable and may be shared; every call to
/// [`Orchestrator::run`] owns its own transcript.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    model: String,
    tools: Arc<ToolRegistry>,
    gate: Option<Arc<dyn ToolGate>>,
    system_prompt: String,
    max_iterations: usize,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            tools,
            gate: None,
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn ToolGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Run a session for one user message.
    pub async fn run(&self, message: &str) -> Result<AgentOutcome, OrchestrationError> {
        let mut messages = vec![
            ChatMessage::new(Role::System, self.system_prompt.as_str()),
            ChatMessage::new(Role::User, message),
        ];
        let tool_schemas = self.tools.get_tool_schemas();
        let tools = (!tool_schemas.is_empty()).then_some(tool_schemas.as_slice());

        let mut tool_calls: Vec<ToolInvocation> = Vec::new();
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut iterations = 0;

        tracing::info!(
            "Session started (model={}, tools={}, gated={})",
            self.model,
            self.tools.len(),
            self.gate.is_some()
        );

        let mut state = SessionState::AwaitingModel;
        loop {
            state = match state {
                SessionState::AwaitingModel => {
                    if iterations == self.max_iterations {
                        tracing::warn!("Session hit the iteration cap ({})", self.max_iterations);
                        return Err(OrchestrationError::IterationLimit(self.max_iterations));
                    }
                    iterations += 1;
                    tracing::debug!("Session iteration {}", iterations);

                    let completion = self.llm.chat_completion(&self.model, &messages, tools).await;
                    let response = match completion {
                        Ok(response) => response,
                        Err(source) => {
                            tracing::error!("Completion request failed: {}", source);
                            for (call, result) in tool_calls.iter().zip(&tool_results) {
                                tracing::error!(
                                    "Tool call {} ({}) ran before the failure: {}",
                                    call.tool_name,
                                    call.id,
                                    result.to_model_content()
                                );
                            }
                            return Err(OrchestrationError::Completion {
                                source,
                                tool_calls,
                                tool_results,
                            });
                        }
                    };
                    if let Some(u) = &response.usage {
                        usage.add(u);
                    }

                    let proposed = response.proposed_calls().to_vec();
                    if proposed.is_empty() {
                        SessionState::Done(response.content.unwrap_or_default())
                    } else {
                        messages.push(ChatMessage::assistant_tool_calls(
                            response.content,
                            proposed.clone(),
                        ));
                        SessionState::ExecutingTools(proposed)
                    }
                }
                SessionState::ExecutingTools(calls) => {
                    let executed = join_all(calls.iter().map(|call| self.execute_call(call))).await;

                    for (call, (invocation, result)) in calls.iter().zip(executed) {
                        messages.push(ChatMessage::tool_result(
                            call.id.as_str(),
                            result.to_model_content(),
                        ));
                        tool_calls.push(invocation);
                        tool_results.push(result);
                    }
                    SessionState::AwaitingModel
                }
                SessionState::Done(text) => {
                    let text = if text.trim().is_empty() {
                        EMPTY_ANSWER.to_string()
                    } else {
                        text
                    };
                    tracing::info!(
                        "Session finished after {} iteration(s), {} tool call(s)",
                        iterations,
                        tool_calls.len()
                    );
                    return Ok(AgentOutcome {
                        text,
                        tool_calls,
                        tool_results,
                        iterations,
                        usage,
                    });
                }
            };
        }
    }

    /// Gate, resolve and execute a single proposed call.
    async fn execute_call(&self, call: &ToolCall) -> (ToolInvocation, ToolResult) {
        let name = call.function.name.as_str();
        let raw = call.function.arguments.trim();

        let parsed = if raw.is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(raw)
        };
        let invocation = ToolInvocation {
            id: call.id.clone(),
            tool_name: name.to_string(),
            arguments: parsed
                .as_ref()
                .map(Clone::clone)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
        };

        if let Some(gate) = &self.gate {
            if let GateDecision::Deny { reason } = gate.authorize(name) {
                tracing::warn!("Gate denied tool {}: {}", name, reason);
                return (invocation, ToolResult::failure(FailureKind::Denied, reason));
            }
        }

        let Some(tool) = self.tools.lookup(name) else {
            tracing::warn!("Model requested unknown tool {}", name);
            return (
                invocation,
                ToolResult::failure(FailureKind::UnknownTool, format!("Unknown tool: {}", name)),
            );
        };

        let args = match parsed {
            Ok(args) => args,
            Err(e) => {
                return (
                    invocation,
                    ToolResult::failure(
                        FailureKind::InvalidArguments,
                        format!("Invalid arguments for {}: malformed JSON: {}", name, e),
                    ),
                );
            }
        };

        tracing::info!("Executing tool {} ({})", name, call.id);
        let result = tool.execute(args).await;
        if !result.success {
            tracing::warn!(
                "Tool {} failed: {}",
                name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        (invocation, result)
    }
}
