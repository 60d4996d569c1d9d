//! The payment-execution tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_args, FailureKind, Tool, ToolArgs, ToolResult};
use crate::payments::PaymentBackend;

/// Forwards a natural-language payment request to the payment backend.
pub struct LocusPayment {
    backend: Arc<dyn PaymentBackend>,
}

impl LocusPayment {
    pub fn new(backend: Arc<dyn PaymentBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaymentArgs {
    prompt: String,
}

impl ToolArgs for PaymentArgs {
    fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must describe the payment to execute".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for LocusPayment {
    fn name(&self) -> &str {
        "locus_payment"
    }

    fn description(&self) -> &str {
        "Execute blockchain payments and transactions using the Locus payment system. \
         Use this tool when users want to send money, make payments, or execute any blockchain transactions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The payment or transaction request to execute, e.g. 'Send 10 USDC to 0x123...'"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: PaymentArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };

        tracing::info!("Forwarding payment request to Locus");
        let outcome = self.backend.execute(&args.prompt).await;

        let result = if outcome.success {
            ToolResult::ok()
        } else {
            ToolResult::failure(
                FailureKind::Execution,
                outcome.error.unwrap_or_else(|| "Payment failed".to_string()),
            )
        };
        let result = match outcome.result {
            Some(text) => result.with("result", text),
            None => result,
        };
        result.with("mcpStatus", json!(outcome.mcp_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::McpStatus;
    use crate::payments::testing::FakePayments;
    use crate::payments::PaymentOutcome;

    #[tokio::test]
    async fn forwards_prompt_and_reports_connection() {
        let backend = Arc::new(FakePayments::succeeding("tx 0xabc confirmed"));
        let tool = LocusPayment::new(backend.clone());

        let result = tool.execute(json!({"prompt": "send 5 usdc to 0xdeadbeef"})).await;
        assert!(result.success);
        assert_eq!(result.payload["result"], "tx 0xabc confirmed");
        assert_eq!(
            result.payload["mcpStatus"],
            json!({"connected": true, "status": "connected"})
        );
        assert_eq!(backend.prompts(), vec!["send 5 usdc to 0xdeadbeef"]);
    }

    #[tokio::test]
    async fn backend_failure_is_execution_failure() {
        let backend = Arc::new(FakePayments::with_outcome(PaymentOutcome::failed(
            "Failed to connect to Locus MCP server: refused",
            McpStatus::Failed,
        )));
        let result = LocusPayment::new(backend)
            .execute(json!({"prompt": "pay bob"}))
            .await;

        assert_eq!(result.failure, Some(FailureKind::Execution));
        assert_eq!(result.payload["mcpStatus"]["connected"], false);
    }

    #[tokio::test]
    async fn blank_prompt_never_reaches_backend() {
        let backend = Arc::new(FakePayments::succeeding("unused"));
        let result = LocusPayment::new(backend.clone())
            .execute(json!({"prompt": "   "}))
            .await;
        assert_eq!(result.failure, Some(FailureKind::InvalidArguments));
        assert!(backend.prompts().is_empty());
    }
}
