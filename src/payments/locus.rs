//! Locus payment agent: a nested, payments-only session over the Locus MCP
//! server.

use async_trait::async_trait;
use std::sync::Arc;

use super::{PaymentBackend, PaymentOutcome};
use crate::agents::{prompts, NamespaceGate, Orchestrator, DEFAULT_MAX_ITERATIONS};
use crate::config::Config;
use crate::llm::LlmClient;
use crate::mcp::{McpClient, McpStatus, McpTool};
use crate::tools::{Tool, ToolRegistry};

/// Server name used to namespace discovered tools (`mcp__locus__*`).
pub const LOCUS_SERVER_NAME: &str = "locus";

pub struct LocusPaymentAgent {
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
    mcp_url: String,
    api_key: Option<String>,
    max_iterations: usize,
}

impl LocusPaymentAgent {
    /// Missing credentials are not an error here; `execute` reports them.
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        model: impl Into<String>,
        mcp_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            mcp_url: mcp_url.into(),
            api_key,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn from_config(config: &Config, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self::new(
            llm,
            config.default_model.as_str(),
            config.locus_mcp_url.as_str(),
            config.locus_api_key.clone(),
        )
        .with_max_iterations(config.max_iterations)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Connect and wrap every discovered tool under the Locus namespace.
    async fn discover_tools(&self, api_key: &str) -> Result<ToolRegistry, PaymentOutcome> {
        tracing::info!("Connecting to Locus MCP server at {}", self.mcp_url);
        let client = McpClient::connect(&self.mcp_url, api_key)
            .await
            .map(Arc::new)
            .map_err(|e| {
                tracing::error!("Locus MCP connection failed: {}", e);
                PaymentOutcome::failed(
                    format!("Failed to connect to Locus MCP server: {}", e),
                    McpStatus::Failed,
                )
            })?;

        let descriptors = client.list_tools().await.map_err(|e| {
            tracing::error!("Locus tools/list failed: {}", e);
            PaymentOutcome::failed(format!("Failed to list Locus tools: {}", e), McpStatus::Failed)
        })?;
        tracing::info!("Locus MCP server offers {} tool(s)", descriptors.len());

        let tools = descriptors.into_iter().map(|descriptor| {
            Arc::new(McpTool::new(LOCUS_SERVER_NAME, Arc::clone(&client), descriptor))
                as Arc<dyn Tool>
        });
        ToolRegistry::from_tools(tools)
            .map_err(|e| PaymentOutcome::failed(e.to_string(), McpStatus::Connected))
    }
}

#[async_trait]
impl PaymentBackend for LocusPaymentAgent {
    async fn execute(&self, prompt: &str) -> PaymentOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return PaymentOutcome::failed(
                "LOCUS_API_KEY is not set in environment variables",
                McpStatus::NotConfigured,
            );
        };
        let Some(llm) = &self.llm else {
            return PaymentOutcome::failed(
                "OPENAI_API_KEY is not set in environment variables",
                McpStatus::NotConfigured,
            );
        };

        let registry = match self.discover_tools(api_key).await {
            Ok(registry) => registry,
            Err(outcome) => return outcome,
        };

        let session = Orchestrator::new(
            Arc::clone(llm),
            self.model.as_str(),
            Arc::new(registry),
            prompts::LOCUS_EXECUTOR,
        )
        .with_gate(Arc::new(NamespaceGate::payments()))
        .with_max_iterations(self.max_iterations);

        match session.run(prompt).await {
            Ok(outcome) => {
                tracing::info!(
                    "Locus session completed with {} tool call(s)",
                    outcome.tool_calls.len()
                );
                PaymentOutcome::completed(outcome.text)
            }
            Err(e) => {
                tracing::error!("Locus session failed: {}", e);
                PaymentOutcome::failed(e.to_string(), McpStatus::Connected)
            }
        }
    }
}
