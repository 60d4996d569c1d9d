//! Agent sessions.
//!
//! # Session kinds
//! - **Payment assistant**: one `locus_payment` tool, no gate
//! - **Full assistant**: database tools plus `locus_payment`, no gate
//! - **Locus executor**: tools discovered from the Locus MCP server, gated to
//!   the `mcp__locus__` namespace (see [`crate::payments`])
//!
//! Every session is built from the same [`Orchestrator`]; they differ only in
//! registry, gate and system prompt.

mod gate;
mod orchestrator;
pub mod prompts;
mod types;

pub use gate::{GateDecision, NamespaceGate, ToolGate, PAYMENT_NAMESPACE, PAYMENT_ONLY_MESSAGE};
pub use orchestrator::{Orchestrator, DEFAULT_MAX_ITERATIONS};
pub use types::{AgentOutcome, OrchestrationError, ToolInvocation};
