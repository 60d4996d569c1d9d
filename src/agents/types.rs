//! Core types for agent sessions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::llm::{LlmError, TokenUsage};
use crate::tools::ToolResult;

/// A tool invocation the model proposed, with its decoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub id: String,
    pub tool_name: String,
    /// Decoded arguments; the raw string when the model sent invalid JSON.
    pub arguments: Value,
}

/// Result of one completed session.
///
/// # Invariants
/// - `tool_calls.len() == tool_results.len()`
/// - `tool_results[i]` answers `tool_calls[i]`; both follow the order in
///   which the model proposed the calls
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub tool_results: Vec<ToolResult>,
    /// Number of completion requests issued
    pub iterations: usize,
    pub usage: TokenUsage,
}

impl AgentOutcome {
    /// Invocations of the named tool.
    pub fn calls_to<'a>(&'a self, tool_name: &'a str) -> impl Iterator<Item = &'a ToolInvocation> {
        self.tool_calls.iter().filter(move |c| c.tool_name == tool_name)
    }
}

/// Fatal session error. Tool failures never end up here.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The model could not be reached. Tool calls that already ran in this
    /// session are kept, since their side effects cannot be undone.
    #[error("Completion request failed: {source}")]
    Completion {
        source: LlmError,
        tool_calls: Vec<ToolInvocation>,
        tool_results: Vec<ToolResult>,
    },

    #[error("No final answer after {0} model turns")]
    IterationLimit(usize),
}

impl OrchestrationError {
    /// Tool calls executed before the session failed.
    pub fn executed_calls(&self) -> &[ToolInvocation] {
        match self {
            Self::Completion { tool_calls, .. } => tool_calls,
            Self::IterationLimit(_) => &[],
        }
    }
}
