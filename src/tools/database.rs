//! Database tools: schema inspection and row-level CRUD against the table store.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::schema::inspect_table;
use super::{parse_args, Tool, ToolArgs, ToolResult};
use crate::store::{Filters, Query, Row, TableStore};

fn check_table_name(table_name: &str) -> Result<(), String> {
    if table_name.trim().is_empty() {
        return Err("tableName must not be empty".to_string());
    }
    Ok(())
}

fn check_filters(filters: &Filters, operation: &str) -> Result<(), String> {
    if filters.is_empty() {
        return Err(format!(
            "filters must name at least one column; refusing to {} every row",
            operation
        ));
    }
    Ok(())
}

// ==================== Schema ====================

/// Infers a table's columns (see [`super::schema`]).
pub struct GetTableSchema {
    store: Arc<dyn TableStore>,
}

impl GetTableSchema {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaArgs {
    table_name: String,
    #[serde(default)]
    insert_sample_data: Option<bool>,
}

impl ToolArgs for SchemaArgs {
    fn validate(&self) -> Result<(), String> {
        check_table_name(&self.table_name)
    }
}

#[async_trait]
impl Tool for GetTableSchema {
    fn name(&self) -> &str {
        "db_get_table_schema"
    }

    fn description(&self) -> &str {
        "Get the schema/structure of a database table: its columns, their data types and whether they are nullable. \
         Use this before inserting or updating data to learn which fields exist. \
         IMPORTANT: if the table is empty and the user wants to add or insert (sample) data, call this with insertSampleData=true; \
         it inserts one sample row so the schema can be inferred."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tableName": {
                    "type": "string",
                    "description": "The table to inspect, e.g. 'users', 'products', 'orders'"
                },
                "insertSampleData": {
                    "type": "boolean",
                    "description": "If true and the table is empty, insert a sample row to infer the schema. Default: false"
                }
            },
            "required": ["tableName"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: SchemaArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };
        let insert_sample = args.insert_sample_data.unwrap_or(false);

        tracing::info!(
            "Getting schema for table {} (insert_sample={})",
            args.table_name,
            insert_sample
        );
        inspect_table(self.store.as_ref(), &args.table_name, insert_sample).await
    }
}

// ==================== Read ====================

pub struct ReadTable {
    store: Arc<dyn TableStore>,
}

impl ReadTable {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ReadArgs {
    table_name: String,
    #[serde(default)]
    filters: Option<Filters>,
    #[serde(default)]
    limit: Option<usize>,
}

impl ToolArgs for ReadArgs {
    fn validate(&self) -> Result<(), String> {
        check_table_name(&self.table_name)?;
        if self.limit == Some(0) {
            return Err("limit must be a positive integer".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for ReadTable {
    fn name(&self) -> &str {
        "db_read_table"
    }

    fn description(&self) -> &str {
        "Read rows from a database table. Use this when users want to query, fetch, list or look up data. \
         Optional filters are column/value pairs that must all match exactly."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tableName": {
                    "type": "string",
                    "description": "The table to read from, e.g. 'users', 'orders'"
                },
                "filters": {
                    "type": "object",
                    "description": "Optional equality filters, e.g. { \"status\": \"active\", \"age\": 25 }",
                    "additionalProperties": true
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Optional maximum number of rows to return"
                }
            },
            "required": ["tableName"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: ReadArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };
        tracing::info!("Reading from table {}", args.table_name);

        let query = Query {
            filters: args.filters.unwrap_or_default(),
            limit: args.limit,
            order: None,
        };

        match self.store.select(&args.table_name, &query).await {
            Ok(rows) => ToolResult::ok()
                .for_table(&args.table_name)
                .with("count", rows.len())
                .with("data", rows_value(rows)),
            Err(e) => ToolResult::execution_error(e).for_table(&args.table_name),
        }
    }
}

// ==================== Insert ====================

pub struct InsertRows {
    store: Arc<dyn TableStore>,
}

impl InsertRows {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct InsertArgs {
    table_name: String,
    data: Row,
}

impl ToolArgs for InsertArgs {
    fn validate(&self) -> Result<(), String> {
        check_table_name(&self.table_name)
    }
}

#[async_trait]
impl Tool for InsertRows {
    fn name(&self) -> &str {
        "db_insert_data"
    }

    fn description(&self) -> &str {
        "Insert a new record into a database table. Use this when users want to create or add records. \
         IMPORTANT: first call db_get_table_schema to learn the columns; if the table is empty, \
         call db_get_table_schema with insertSampleData=true first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tableName": {
                    "type": "string",
                    "description": "The table to insert into"
                },
                "data": {
                    "type": "object",
                    "description": "Column/value pairs of the new record, e.g. { \"name\": \"John\", \"email\": \"john@example.com\" }. Include all required columns.",
                    "additionalProperties": true
                }
            },
            "required": ["tableName", "data"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: InsertArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };
        tracing::info!("Inserting into table {}", args.table_name);

        match self.store.insert(&args.table_name, args.data).await {
            Ok(rows) => {
                let message = format!(
                    "Successfully inserted {} row(s) into {}",
                    rows.len().max(1),
                    args.table_name
                );
                ToolResult::ok()
                    .for_table(&args.table_name)
                    .with("inserted", rows_value(rows))
                    .with("message", message)
            }
            Err(e) => ToolResult::execution_error(e).for_table(&args.table_name),
        }
    }
}

// ==================== Update ====================

pub struct UpdateRows {
    store: Arc<dyn TableStore>,
}

impl UpdateRows {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateArgs {
    table_name: String,
    filters: Filters,
    data: Row,
}

impl ToolArgs for UpdateArgs {
    fn validate(&self) -> Result<(), String> {
        check_table_name(&self.table_name)?;
        check_filters(&self.filters, "update")?;
        if self.data.is_empty() {
            return Err("data must contain at least one column to change".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for UpdateRows {
    fn name(&self) -> &str {
        "db_update_data"
    }

    fn description(&self) -> &str {
        "Update existing records in a database table. Filters (required, at least one column) select the rows to change."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tableName": {
                    "type": "string",
                    "description": "The table to update"
                },
                "filters": {
                    "type": "object",
                    "description": "Equality filters identifying the rows, e.g. { \"id\": 1 }",
                    "minProperties": 1,
                    "additionalProperties": true
                },
                "data": {
                    "type": "object",
                    "description": "Column/value pairs to set, e.g. { \"status\": \"active\" }",
                    "minProperties": 1,
                    "additionalProperties": true
                }
            },
            "required": ["tableName", "filters", "data"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: UpdateArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };
        let predicate = Value::Object(args.filters.clone());
        tracing::info!("Updating table {} where {}", args.table_name, predicate);

        match self
            .store
            .update(&args.table_name, &args.filters, args.data)
            .await
        {
            Ok(rows) => {
                let message = format!(
                    "Successfully updated {} row(s) in {}",
                    rows.len(),
                    args.table_name
                );
                ToolResult::ok()
                    .for_table(&args.table_name)
                    .with("count", rows.len())
                    .with("updated", rows_value(rows))
                    .with("message", message)
            }
            Err(e) => ToolResult::execution_error(e).for_table(&args.table_name),
        }
    }
}

// ==================== Delete ====================

pub struct DeleteRows {
    store: Arc<dyn TableStore>,
}

impl DeleteRows {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DeleteArgs {
    table_name: String,
    filters: Filters,
}

impl ToolArgs for DeleteArgs {
    fn validate(&self) -> Result<(), String> {
        check_table_name(&self.table_name)?;
        check_filters(&self.filters, "delete")
    }
}

#[async_trait]
impl Tool for DeleteRows {
    fn name(&self) -> &str {
        "db_delete_data"
    }

    fn description(&self) -> &str {
        "Delete records from a database table. Filters (required, at least one column) select the rows to remove."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tableName": {
                    "type": "string",
                    "description": "The table to delete from"
                },
                "filters": {
                    "type": "object",
                    "description": "Equality filters identifying the rows, e.g. { \"id\": 1 } or { \"status\": \"inactive\" }",
                    "minProperties": 1,
                    "additionalProperties": true
                }
            },
            "required": ["tableName", "filters"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: DeleteArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };
        let predicate = Value::Object(args.filters.clone());
        tracing::info!("Deleting from table {} where {}", args.table_name, predicate);

        match self.store.delete(&args.table_name, &args.filters).await {
            Ok(rows) => {
                let message = format!(
                    "Successfully deleted {} row(s) from {}",
                    rows.len(),
                    args.table_name
                );
                ToolResult::ok()
                    .for_table(&args.table_name)
                    .with("count", rows.len())
                    .with("deleted", rows_value(rows))
                    .with("message", message)
            }
            Err(e) => ToolResult::execution_error(e).for_table(&args.table_name),
        }
    }
}

fn rows_value(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{row, InMemoryTableStore, MemoryTable, StoreCall};
    use crate::tools::FailureKind;

    fn store() -> Arc<InMemoryTableStore> {
        Arc::new(
            InMemoryTableStore::new().with_call_log().with_table(
                "users",
                MemoryTable::new()
                    .with_rows(vec![
                        row(json!({"id": 1, "name": "Ada", "status": "active"})),
                        row(json!({"id": 2, "name": "Bob", "status": "inactive"})),
                        row(json!({"id": 3, "name": "Cy", "status": "active"})),
                        row(json!({"id": 4, "name": "Di", "status": "active"})),
                    ])
                    .with_auto_id(),
            ),
        )
    }

    #[tokio::test]
    async fn read_honours_filters_and_limit() {
        let store = store();
        let tool = ReadTable::new(store.clone());
        let result = tool
            .execute(json!({"tableName": "users", "filters": {"status": "active"}, "limit": 2}))
            .await;

        assert!(result.success);
        let data = result.payload["data"].as_array().unwrap();
        assert!(data.len() <= 2);
        assert!(data.iter().all(|r| r["status"] == "active"));
        assert_eq!(result.payload["count"], data.len());
    }

    #[tokio::test]
    async fn read_without_filters_returns_whole_table() {
        let tool = ReadTable::new(store());
        let result = tool.execute(json!({"tableName": "users"})).await;
        assert_eq!(result.payload["count"], 4);
    }

    #[tokio::test]
    async fn malformed_arguments_never_reach_the_store() {
        let store = store();
        let tool = ReadTable::new(store.clone());

        for args in [
            json!({"table": "users"}),
            json!({"tableName": 42}),
            json!({"tableName": "  "}),
            json!({"tableName": "users", "limit": 0}),
        ] {
            let result = tool.execute(args).await;
            assert!(!result.success);
            assert_eq!(result.failure, Some(FailureKind::InvalidArguments));
        }
        assert!(store.calls().await.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_require_filters() {
        let store = store();
        let update = UpdateRows::new(store.clone());
        let delete = DeleteRows::new(store.clone());

        let result = update
            .execute(json!({"tableName": "users", "filters": {}, "data": {"status": "gone"}}))
            .await;
        assert_eq!(result.failure, Some(FailureKind::InvalidArguments));

        let result = delete.execute(json!({"tableName": "users", "filters": {}})).await;
        assert_eq!(result.failure, Some(FailureKind::InvalidArguments));

        let result = delete.execute(json!({"tableName": "users"})).await;
        assert_eq!(result.failure, Some(FailureKind::InvalidArguments));

        assert!(store.calls().await.is_empty());
        assert_eq!(store.rows("users").await.len(), 4);
    }

    #[tokio::test]
    async fn writes_pass_caller_filters_through() {
        let store = store();
        let update = UpdateRows::new(store.clone());
        let delete = DeleteRows::new(store.clone());

        let result = update
            .execute(json!({
                "tableName": "users",
                "filters": {"id": 2},
                "data": {"status": "active"}
            }))
            .await;
        assert!(result.success);
        assert_eq!(result.payload["count"], 1);

        let result = delete
            .execute(json!({"tableName": "users", "filters": {"name": "Cy"}}))
            .await;
        assert_eq!(result.payload["count"], 1);

        let calls = store.calls().await;
        assert_eq!(
            calls,
            vec![
                StoreCall::Update {
                    table: "users".into(),
                    filters: row(json!({"id": 2})),
                    patch: row(json!({"status": "active"})),
                },
                StoreCall::Delete {
                    table: "users".into(),
                    filters: row(json!({"name": "Cy"})),
                },
            ]
        );
    }

    #[tokio::test]
    async fn insert_returns_stored_row() {
        let store = store();
        let tool = InsertRows::new(store.clone());
        let result = tool
            .execute(json!({"tableName": "users", "data": {"name": "Eve", "status": "active"}}))
            .await;

        assert!(result.success);
        assert_eq!(result.payload["inserted"][0]["id"], 5);
        assert_eq!(result.payload["message"], "Successfully inserted 1 row(s) into users");
    }

    #[tokio::test]
    async fn store_errors_become_failed_results() {
        let tool = InsertRows::new(store());
        let result = tool
            .execute(json!({"tableName": "ghosts", "data": {"boo": true}}))
            .await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Execution));
        assert_eq!(result.table_name.as_deref(), Some("ghosts"));
        assert!(result.error.unwrap().contains("does not exist"));
    }
}
