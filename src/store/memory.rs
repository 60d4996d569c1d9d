//! In-memory table store (non-persistent).

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Filters, Query, Row, StoreError, TableStore};

/// A table held in memory, with the bits of server behaviour the agent
/// relies on: generated ids, column defaults, and not-null constraints.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Vec<Row>,
    auto_id: bool,
    next_id: i64,
    defaults: Row,
    timestamps: Vec<String>,
    required: Vec<String>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Assign an increasing integer `id` to inserted rows that lack one.
    pub fn with_auto_id(mut self) -> Self {
        self.auto_id = true;
        self.next_id = self
            .rows
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .map_or(1, |max| max + 1);
        self
    }

    pub fn with_default(mut self, column: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(column.into(), value);
        self
    }

    /// Column stamped with the insert time (RFC 3339) when not supplied.
    pub fn with_timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamps.push(column.into());
        self
    }

    /// Column that must be non-null after defaults are applied.
    pub fn with_required(mut self, column: impl Into<String>) -> Self {
        self.required.push(column.into());
        self
    }

    fn materialize(&mut self, table: &str, mut record: Row) -> Result<Row, StoreError> {
        for (column, value) in &self.defaults {
            record.entry(column.clone()).or_insert_with(|| value.clone());
        }
        for column in &self.timestamps {
            record
                .entry(column.clone())
                .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));
        }
        // Constraint check first: a rejected insert does not consume an id.
        for column in &self.required {
            if record.get(column).map_or(true, Value::is_null) {
                return Err(StoreError::backend(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column, table
                )));
            }
        }
        if self.auto_id && !record.contains_key("id") {
            record.insert("id".to_string(), Value::from(self.next_id));
            self.next_id += 1;
        }
        Ok(record)
    }
}

/// Every operation the store received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Rpc { function: String, params: Value },
    Select { table: String, query: Query },
    Insert { table: String, record: Row },
    Update { table: String, filters: Filters, patch: Row },
    Delete { table: String, filters: Filters },
}

pub struct InMemoryTableStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
    rpc_results: HashMap<String, Value>,
    /// Operation log, only kept after [`InMemoryTableStore::with_call_log`]
    calls: Option<RwLock<Vec<StoreCall>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            rpc_results: HashMap::new(),
            calls: None,
        }
    }

    pub fn with_table(mut self, name: impl Into<String>, table: MemoryTable) -> Self {
        self.tables.get_mut().insert(name.into(), table);
        self
    }

    /// Fixed result for a server-side function.
    pub fn with_rpc(mut self, function: impl Into<String>, result: Value) -> Self {
        self.rpc_results.insert(function.into(), result);
        self
    }

    /// Record every operation for later inspection with [`calls`](Self::calls).
    pub fn with_call_log(mut self) -> Self {
        self.calls = Some(RwLock::new(Vec::new()));
        self
    }

    /// Operations received so far; empty unless the call log is enabled.
    pub async fn calls(&self) -> Vec<StoreCall> {
        match &self.calls {
            Some(calls) => calls.read().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    async fn record(&self, call: impl FnOnce() -> StoreCall) {
        if let Some(calls) = &self.calls {
            calls.write().await.push(call());
        }
    }
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::Backend {
        status: Some(404),
        message: format!("relation \"public.{}\" does not exist", table),
    }
}

fn matches(row: &Row, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(column, expected)| row.get(column).map_or(expected.is_null(), |v| v == expected))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Postgres sorts nulls last in ascending order.
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn rpc(&self, function: &str, params: Value) -> Result<Value, StoreError> {
        self.record(|| StoreCall::Rpc {
            function: function.to_string(),
            params,
        })
        .await;

        self.rpc_results.get(function).cloned().ok_or_else(|| {
            StoreError::backend(format!(
                "Could not find the function public.{} in the schema cache",
                function
            ))
        })
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.record(|| StoreCall::Select {
            table: table.to_string(),
            query: query.clone(),
        })
        .await;

        let tables = self.tables.read().await;
        let stored = tables.get(table).ok_or_else(|| missing_table(table))?;

        let mut rows: Vec<Row> = stored
            .rows
            .iter()
            .filter(|r| matches(r, &query.filters))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: Row) -> Result<Vec<Row>, StoreError> {
        self.record(|| StoreCall::Insert {
            table: table.to_string(),
            record: record.clone(),
        })
        .await;

        let mut tables = self.tables.write().await;
        let stored = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let row = stored.materialize(table, record)?;
        stored.rows.push(row.clone());
        Ok(vec![row])
    }

    async fn update(
        &self,
        table: &str,
        filters: &Filters,
        patch: Row,
    ) -> Result<Vec<Row>, StoreError> {
        self.record(|| StoreCall::Update {
            table: table.to_string(),
            filters: filters.clone(),
            patch: patch.clone(),
        })
        .await;

        if filters.is_empty() {
            return Err(StoreError::UnfilteredWrite("update"));
        }

        let mut tables = self.tables.write().await;
        let stored = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        let mut updated = Vec::new();
        for row in stored.rows.iter_mut().filter(|r| matches(r, filters)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, StoreError> {
        self.record(|| StoreCall::Delete {
            table: table.to_string(),
            filters: filters.clone(),
        })
        .await;

        if filters.is_empty() {
            return Err(StoreError::UnfilteredWrite("delete"));
        }

        let mut tables = self.tables.write().await;
        let stored = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        let (deleted, kept): (Vec<Row>, Vec<Row>) = stored
            .rows
            .drain(..)
            .partition(|r| matches(r, filters));
        stored.rows = kept;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{row, OrderBy};
    use serde_json::json;

    fn orders() -> InMemoryTableStore {
        InMemoryTableStore::new().with_table(
            "orders",
            MemoryTable::new()
                .with_rows(vec![
                    row(json!({"id": 1, "status": "pending", "total": 10})),
                    row(json!({"id": 2, "status": "shipped", "total": 30})),
                    row(json!({"id": 3, "status": "pending", "total": 20})),
                ])
                .with_auto_id(),
        )
    }

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = orders();
        let rows = store
            .select(
                "orders",
                &Query::all()
                    .eq("status", "pending")
                    .order(OrderBy::desc("total"))
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![row(json!({"id": 3, "status": "pending", "total": 20}))]);
    }

    #[tokio::test]
    async fn operations_are_only_logged_when_asked() {
        let quiet = orders();
        quiet.insert("orders", row(json!({"status": "new"}))).await.unwrap();
        quiet.select("orders", &Query::all()).await.unwrap();
        assert!(quiet.calls().await.is_empty());

        let logged = orders().with_call_log();
        logged.select("orders", &Query::all()).await.unwrap();
        assert_eq!(logged.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn insert_applies_defaults_and_constraints() {
        let store = InMemoryTableStore::new().with_table(
            "events",
            MemoryTable::new()
                .with_auto_id()
                .with_default("kind", json!("note"))
                .with_required("created_at"),
        );

        let err = store.insert("events", Row::new()).await.unwrap_err();
        assert!(err.to_string().contains("not-null constraint"));

        let inserted = store
            .insert("events", row(json!({"created_at": "2026-01-01T00:00:00Z"})))
            .await
            .unwrap();
        assert_eq!(inserted[0]["kind"], "note");
        assert_eq!(inserted[0]["id"], 1);
    }

    #[tokio::test]
    async fn timestamp_columns_are_stamped_unless_given() {
        let store = InMemoryTableStore::new().with_table(
            "notes",
            MemoryTable::new().with_timestamp("created_at"),
        );
        let stamped = store.insert("notes", Row::new()).await.unwrap();
        let stamp = stamped[0]["created_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());

        let given = store
            .insert("notes", row(json!({"created_at": "2020-01-01T00:00:00Z"})))
            .await
            .unwrap();
        assert_eq!(given[0]["created_at"], "2020-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn update_and_delete_touch_only_matching_rows() {
        let store = orders();
        let updated = store
            .update("orders", &row(json!({"id": 2})), row(json!({"status": "delivered"})))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);

        let deleted = store
            .delete("orders", &row(json!({"status": "pending"})))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 2);

        let remaining = store.rows("orders").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["status"], "delivered");
    }

    #[tokio::test]
    async fn unfiltered_delete_is_refused() {
        let store = orders();
        let err = store.delete("orders", &Filters::new()).await.unwrap_err();
        assert_eq!(err, StoreError::UnfilteredWrite("delete"));
        assert_eq!(store.rows("orders").await.len(), 3);
    }

    #[tokio::test]
    async fn missing_table_is_backend_error() {
        let store = orders();
        let err = store.select("ghosts", &Query::all()).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
