//! Exposes MCP-discovered tools through the local [`Tool`] trait.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::client::McpClient;
use super::types::McpToolDescriptor;
use crate::store::Row;
use crate::tools::{parse_args, FailureKind, Tool, ToolArgs, ToolResult};

/// Name under which a server's tool is registered: `mcp__<server>__<tool>`.
pub fn namespaced_name(server: &str, tool: &str) -> String {
    format!("mcp__{}__{}", server, tool)
}

/// MCP arguments are an open object; the server owns the full schema.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct McpArguments(Row);

impl ToolArgs for McpArguments {}

/// A remote tool bound to a live client for the session lifetime.
pub struct McpTool {
    client: Arc<McpClient>,
    descriptor: McpToolDescriptor,
    name: String,
}

impl McpTool {
    pub fn new(server: &str, client: Arc<McpClient>, descriptor: McpToolDescriptor) -> Self {
        Self {
            name: namespaced_name(server, &descriptor.name),
            client,
            descriptor,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> Value {
        if self.descriptor.input_schema.is_object() {
            self.descriptor.input_schema.clone()
        } else {
            serde_json::json!({"type": "object", "properties": {}})
        }
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let McpArguments(args) = match parse_args(&self.name, args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };

        let missing: Vec<&str> = self
            .descriptor
            .required_arguments()
            .into_iter()
            .filter(|field| !args.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return ToolResult::failure(
                FailureKind::InvalidArguments,
                format!(
                    "Invalid arguments for {}: missing required field(s) {}",
                    self.name,
                    missing.join(", ")
                ),
            );
        }

        match self
            .client
            .call_tool(&self.descriptor.name, Value::Object(args))
            .await
        {
            Ok(output) => ToolResult::ok().with("content", output),
            Err(e) => ToolResult::execution_error(e),
        }
    }
}
