//! # Payroll Agent
//!
//! Backend of a contractor-payments dashboard.
//!
//! This library provides:
//! - A tool-calling agent loop over an OpenAI-compatible completion API
//! - Database tools over a row-oriented table store (Supabase or in-memory)
//! - A payment tool that runs a nested, namespace-gated session against the
//!   Locus MCP server
//! - HTTP endpoints for the dashboard, including GitHub OAuth through Metorial
//!
//! ## Session Flow
//!
//! ```text
//!   request ──▶ Orchestrator ──▶ LLM ──▶ tool calls ──▶ ToolRegistry
//!                    ▲                                      │
//!                    └───────────── tool results ◀──────────┘
//! ```
//!
//! The payment tool itself owns another orchestrator whose registry holds
//! only `mcp__locus__*` tools.
//!
//! ## Modules
//! - `agents`: orchestrator, tool gate, prompts
//! - `tools`: tool trait, registry, database and payment tools
//! - `store`: table store trait and backends
//! - `mcp`: streamable-HTTP MCP client and tool adapter
//! - `payments`: Locus payment executor
//! - `oauth`: OAuth broker client and bounded polling
//! - `github`: pull-request listing through the broker's GitHub deployment
//! - `llm`: completion client

pub mod agents;
pub mod api;
pub mod config;
pub mod github;
pub mod llm;
pub mod mcp;
pub mod oauth;
pub mod payments;
pub mod store;
pub mod tools;

pub use config::Config;
