//! MCP (Model Context Protocol) support.
//!
//! Only the client side over HTTP JSON-RPC: connect, discover tools, call
//! them. Discovered tools are wrapped as [`McpTool`] so an orchestrator can
//! use them like any local tool.

mod client;
mod tool;
mod types;

pub use client::{McpClient, McpError};
pub use tool::{namespaced_name, McpTool};
pub use types::{ConnectionStatus, McpStatus, McpToolDescriptor};
