//! JSON-RPC client for one HTTP MCP server.

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::*;

const SESSION_HEADER: &str = "mcp-session-id";

/// Upper bound on `tools/list` pages fetched per connection.
const MAX_TOOL_PAGES: usize = 20;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Tool error: {0}")]
    ToolFailed(String),
}

/// Client for an MCP server reached over streamable HTTP with bearer auth.
pub struct McpClient {
    client: Client,
    endpoint: String,
    api_key: String,
    request_id: AtomicU64,
    session_id: RwLock<Option<String>>,
}

impl McpClient {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            request_id: AtomicU64::new(1),
            session_id: RwLock::new(None),
        }
    }

    /// Create a client and complete the initialize handshake.
    pub async fn connect(endpoint: &str, api_key: &str) -> Result<Self, McpError> {
        let client = Self::new(endpoint, api_key);
        let init = client.initialize().await?;
        tracing::info!(
            "Connected to MCP server {} ({}, protocol {})",
            client.endpoint,
            init.server_info
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unnamed"),
            init.protocol_version
        );
        Ok(client)
    }

    /// Get the next request ID for JSON-RPC
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<reqwest::Response, McpError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);
        if let Some(session) = self.session_id.read().await.as_deref() {
            request = request.header(SESSION_HEADER, session);
        }
        Ok(request.send().await?)
    }

    /// Send a JSON-RPC request and return its `result`.
    async fn send_jsonrpc(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id, method, params);
        tracing::debug!("MCP request {} ({})", method, id);

        let response = self.post(&request).await?;
        let status = response.status();

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(session.to_string());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let rpc = decode_rpc_body(&content_type, &body, id)?;
        if let Some(error) = rpc.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        rpc.result
            .ok_or_else(|| McpError::Protocol(format!("No result in {} response", method)))
    }

    /// Initialize connection with the server.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let params = serde_json::to_value(params).map_err(|e| McpError::Protocol(e.to_string()))?;

        let result = self.send_jsonrpc("initialize", Some(params)).await?;
        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

        // No response expected, but some servers refuse requests until they see it.
        if let Err(e) = self
            .post(&json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized"
            }))
            .await
        {
            tracing::warn!("MCP initialized notification failed: {}", e);
        }

        Ok(init)
    }

    /// All tools the server offers, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.send_jsonrpc("tools/list", params).await?;
            let page: McpToolsResponse =
                serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!("MCP tools/list stopped after {} pages", MAX_TOOL_PAGES);
        Ok(tools)
    }

    /// Call a tool and return its text output.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<String, McpError> {
        let params = json!({
            "name": tool_name,
            "arguments": arguments
        });
        let result = self.send_jsonrpc("tools/call", Some(params)).await?;
        let response: McpCallToolResponse =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

        if response.is_error {
            return Err(McpError::ToolFailed(response.text()));
        }
        Ok(response.text())
    }
}

/// Decode a JSON-RPC response delivered either as plain JSON or as a
/// server-sent event stream (the response is the event carrying our id).
fn decode_rpc_body(content_type: &str, body: &str, id: u64) -> Result<JsonRpcResponse, McpError> {
    if !content_type.starts_with("text/event-stream") {
        return serde_json::from_str(body)
            .map_err(|e| McpError::Protocol(format!("Invalid JSON-RPC response: {}", e)));
    }

    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .find(|rpc| rpc.id == Some(id))
        .ok_or_else(|| {
            McpError::Protocol(format!("No response for request {} in event stream", id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_json() {
        let rpc = decode_rpc_body(
            "application/json",
            r#"{"jsonrpc":"2.0","id":3,"result":{"tools":[]}}"#,
            3,
        )
        .unwrap();
        assert_eq!(rpc.result, Some(json!({"tools": []})));
    }

    #[test]
    fn decodes_matching_event_from_stream() {
        let body = "event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\n\n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":7,\"error\":{\"code\":-32601,\"message\":\"Method not found\"}}\n\n";
        let rpc = decode_rpc_body("text/event-stream; charset=utf-8", body, 7).unwrap();
        let error = rpc.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn stream_without_our_id_is_protocol_error() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n";
        let err = decode_rpc_body("text/event-stream", body, 2).unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_transport_error() {
        let err = McpClient::connect("http://127.0.0.1:9/mcp", "key")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Transport(_)));
    }
}
