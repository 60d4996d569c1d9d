//! Payment backend: executes a natural-language payment request.

mod locus;

pub use locus::{LocusPaymentAgent, LOCUS_SERVER_NAME};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::mcp::{ConnectionStatus, McpStatus};

/// What the payment backend reports for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub mcp_status: ConnectionStatus,
}

impl PaymentOutcome {
    pub fn completed(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            mcp_status: ConnectionStatus::of(McpStatus::Connected),
        }
    }

    pub fn failed(error: impl Into<String>, status: McpStatus) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            mcp_status: ConnectionStatus::of(status),
        }
    }
}

/// Executes payment prompts. Implementations never return errors; every
/// failure is reported inside the outcome.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn execute(&self, prompt: &str) -> PaymentOutcome;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed outcome.
    pub struct FakePayments {
        outcome: PaymentOutcome,
        prompts: Mutex<Vec<String>>,
    }

    impl FakePayments {
        pub fn succeeding(result: &str) -> Self {
            Self::with_outcome(PaymentOutcome::completed(result))
        }

        pub fn with_outcome(outcome: PaymentOutcome) -> Self {
            Self {
                outcome,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentBackend for FakePayments {
        async fn execute(&self, prompt: &str) -> PaymentOutcome {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.outcome.clone()
        }
    }
}
