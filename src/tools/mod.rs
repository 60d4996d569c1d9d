//! Tool system for the agent.
//!
//! A tool is a named capability the completion backend may invoke. Each tool
//! declares a JSON schema for its arguments, validates incoming arguments into
//! a typed record before doing anything, and always answers with a
//! [`ToolResult`] envelope; executor failures never escape as errors.

mod database;
mod payment;
pub mod schema;

pub use database::{DeleteRows, GetTableSchema, InsertRows, ReadTable, UpdateRows};
pub use payment::LocusPayment;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::payments::PaymentBackend;
use crate::store::TableStore;

/// Why a tool invocation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Arguments did not match the tool's input contract
    InvalidArguments,
    /// The external call inside the executor failed
    Execution,
    /// The session's gate refused the tool
    Denied,
    /// No tool of that name in the session's registry
    UnknownTool,
}

/// Uniform success/failure envelope returned by every tool.
///
/// Serialized flat so the model sees e.g.
/// `{"success":true,"tableName":"orders","count":2,"data":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Tool-specific payload fields.
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl ToolResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            table_name: None,
            hint: None,
            failure: None,
            payload: serde_json::Map::new(),
        }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            failure: Some(kind),
            ..Self::ok()
        }
    }

    pub fn execution_error(error: impl std::fmt::Display) -> Self {
        Self::failure(FailureKind::Execution, error.to_string())
    }

    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Add a payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// JSON text fed back to the model as the tool turn.
    pub fn to_model_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"unserializable tool result: {}"}}"#, e)
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl From<ToolError> for ToolResult {
    fn from(e: ToolError) -> Self {
        ToolResult::failure(FailureKind::InvalidArguments, e.to_string())
    }
}

/// Typed argument record of a tool.
pub trait ToolArgs: DeserializeOwned {
    /// Checks serde cannot express (non-empty names, required filters, ...).
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Decode and validate raw model arguments into `T`.
pub fn parse_args<T: ToolArgs>(tool: &str, args: Value) -> Result<T, ToolError> {
    // Models sometimes send `null` for no-argument calls.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };

    let parsed: T = serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })?;

    parsed
        .validate()
        .map_err(|reason| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason,
        })?;

    Ok(parsed)
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// Description the model uses to decide when the tool applies.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. Implementations validate `args` with [`parse_args`]
    /// first and convert every failure into a `ToolResult`.
    async fn execute(&self, args: Value) -> ToolResult;
}

/// Registry of the tools exposed to one kind of session.
///
/// Built once at configuration time and shared read-only (`Arc`) by every
/// session that uses it.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a tool. Names must be unique within a registry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ConfigError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ConfigError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Build a registry from a fixed tool set.
    pub fn from_tools(
        tools: impl IntoIterator<Item = Arc<dyn Tool>>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::empty();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Database tools only.
    pub fn database(store: Arc<dyn TableStore>) -> Result<Self, ConfigError> {
        Self::from_tools(database_tools(store))
    }

    /// The single payment tool (the payment assistant endpoint).
    pub fn payments(payments: Arc<dyn PaymentBackend>) -> Result<Self, ConfigError> {
        Self::from_tools([Arc::new(LocusPayment::new(payments)) as Arc<dyn Tool>])
    }

    /// Database tools plus the payment tool (the full assistant endpoint).
    pub fn full(
        store: Arc<dyn TableStore>,
        payments: Arc<dyn PaymentBackend>,
    ) -> Result<Self, ConfigError> {
        let mut tools = database_tools(store);
        tools.push(Arc::new(LocusPayment::new(payments)));
        Self::from_tools(tools)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool schemas in LLM-compatible format, in registration order.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }
}

fn database_tools(store: Arc<dyn TableStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GetTableSchema::new(Arc::clone(&store))),
        Arc::new(ReadTable::new(Arc::clone(&store))),
        Arc::new(InsertRows::new(Arc::clone(&store))),
        Arc::new(UpdateRows::new(Arc::clone(&store))),
        Arc::new(DeleteRows::new(store)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTableStore;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::ok().with("args", args)
        }
    }

    #[test]
    fn duplicate_names_are_a_configuration_error() {
        let err = ToolRegistry::from_tools([
            Arc::new(Echo("same")) as Arc<dyn Tool>,
            Arc::new(Echo("same")),
        ])
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::DuplicateTool(name) if name == "same"));
    }

    #[test]
    fn lookup_and_schema_order() {
        let registry = ToolRegistry::from_tools([
            Arc::new(Echo("b")) as Arc<dyn Tool>,
            Arc::new(Echo("a")),
        ])
        .unwrap();

        assert!(registry.lookup("a").is_some());
        assert!(registry.lookup("missing").is_none());
        let names: Vec<_> = registry
            .get_tool_schemas()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn database_registry_has_five_distinct_tools() {
        let registry = ToolRegistry::database(Arc::new(InMemoryTableStore::new())).unwrap();
        assert_eq!(registry.len(), 5);
        for name in [
            "db_get_table_schema",
            "db_read_table",
            "db_insert_data",
            "db_update_data",
            "db_delete_data",
        ] {
            assert!(registry.has_tool(name), "missing {}", name);
        }
    }

    #[test]
    fn envelope_serializes_flat() {
        let result = ToolResult::ok()
            .for_table("orders")
            .with("count", 2)
            .with("data", json!([]));
        let json: Value = serde_json::from_str(&result.to_model_content()).unwrap();
        assert_eq!(
            json,
            json!({"success": true, "tableName": "orders", "count": 2, "data": []})
        );

        let failure = ToolResult::failure(FailureKind::Denied, "nope");
        let json: Value = serde_json::from_str(&failure.to_model_content()).unwrap();
        assert_eq!(json, json!({"success": false, "error": "nope", "failure": "denied"}));
    }
}
