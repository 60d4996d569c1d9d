//! Per-invocation policy applied before a proposed tool call runs.

/// Name prefix of every tool discovered from the Locus payment server.
pub const PAYMENT_NAMESPACE: &str = "mcp__locus__";

/// Message returned to the model when the payments gate refuses a call.
pub const PAYMENT_ONLY_MESSAGE: &str = "Only payment tools are allowed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny { reason: String },
}

/// Decides whether a proposed invocation may run. Only the tool name is
/// consulted; arguments never change the decision.
pub trait ToolGate: Send + Sync {
    fn authorize(&self, tool_name: &str) -> GateDecision;
}

/// Allows tools whose name starts with a fixed prefix.
#[derive(Debug, Clone)]
pub struct NamespaceGate {
    prefix: String,
    reason: String,
}

impl NamespaceGate {
    pub fn new(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    /// The gate of the payments-only session.
    pub fn payments() -> Self {
        Self::new(PAYMENT_NAMESPACE, PAYMENT_ONLY_MESSAGE)
    }
}

impl ToolGate for NamespaceGate {
    fn authorize(&self, tool_name: &str) -> GateDecision {
        if tool_name.starts_with(&self.prefix) {
            GateDecision::Allow
        } else {
            GateDecision::Deny {
                reason: self.reason.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payments_gate_checks_namespace_only() {
        let gate = NamespaceGate::payments();
        assert_eq!(gate.authorize("mcp__locus__send_usdc"), GateDecision::Allow);
        assert_eq!(
            gate.authorize("db_delete_data"),
            GateDecision::Deny {
                reason: "Only payment tools are allowed".to_string()
            }
        );
        // Prefix must match from the start.
        assert!(matches!(
            gate.authorize("x_mcp__locus__send_usdc"),
            GateDecision::Deny { .. }
        ));
        assert!(matches!(gate.authorize("mcp__other__pay"), GateDecision::Deny { .. }));
    }
}
