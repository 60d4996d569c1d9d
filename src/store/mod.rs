//! Generic row-oriented table store.
//!
//! The agent and the dashboard endpoints only see tables by name, rows as open
//! JSON maps, and equality filters. Two backends:
//! - [`SupabaseStore`]: PostgREST over HTTP
//! - [`InMemoryTableStore`]: non-persistent, used for local runs and tests

mod memory;
mod supabase;

pub use memory::{InMemoryTableStore, MemoryTable, StoreCall};
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One stored record: column name -> value.
pub type Row = serde_json::Map<String, Value>;

/// Equality conjunction: every entry is ANDed as `column = value`.
pub type Filters = Row;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The backend answered but rejected the operation (missing table,
    /// constraint violation, permission denied, ...).
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    #[error("Table store unreachable: {0}")]
    Transport(String),

    #[error("Unexpected table store response: {0}")]
    Decode(String),

    #[error("Refusing to {0} without filters")]
    UnfilteredWrite(&'static str),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

/// Sort specification for `select`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Parameters of a `select`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Filters,
    pub limit: Option<usize>,
    pub order: Option<OrderBy>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    /// Equality filter on a single column.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }
}

/// Row-level CRUD plus server-side functions.
///
/// `update` and `delete` must never run without a predicate: implementations
/// return [`StoreError::UnfilteredWrite`] when `filters` is empty.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Call a server-side function (PostgREST `rpc/<name>`).
    async fn rpc(&self, function: &str, params: Value) -> Result<Value, StoreError>;

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Insert one record and return the stored row(s), including server defaults.
    async fn insert(&self, table: &str, record: Row) -> Result<Vec<Row>, StoreError>;

    async fn update(&self, table: &str, filters: &Filters, patch: Row)
        -> Result<Vec<Row>, StoreError>;

    async fn delete(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, StoreError>;
}

/// Build a [`Row`] from a `json!({...})` object; anything else yields an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
