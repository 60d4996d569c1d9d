//! Supabase table store over the PostgREST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::{Filters, Query, Row, StoreError, TableStore};

/// Supabase client for row-level CRUD and RPC calls.
pub struct SupabaseStore {
    client: Client,
    url: String,
    api_key: String,
}

impl SupabaseStore {
    /// `api_key` is the service-role key when available, the anon key otherwise.
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url(), urlencoding::encode(table))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Read the body of a PostgREST response, turning error statuses into
    /// [`StoreError::Backend`] with the server's message.
    async fn read_body(resp: Response) -> Result<String, StoreError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Backend {
                status: Some(status.as_u16()),
                message: postgrest_message(&text)
                    .unwrap_or_else(|| format!("{} - {}", status, text)),
            });
        }

        Ok(text)
    }

    async fn read_rows(resp: Response) -> Result<Vec<Row>, StoreError> {
        let text = Self::read_body(resp).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Decode(format!("{}: {}", e, text)))
    }
}

/// PostgREST errors carry `{"message": ..., "code": ..., "hint": ...}`.
fn postgrest_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Render a filter value in PostgREST operator syntax.
fn filter_operand(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{}", s),
        other => format!("eq.{}", other),
    }
}

/// Query-string pairs for an equality conjunction.
fn filter_params(filters: &Filters) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| (column.clone(), filter_operand(value)))
        .collect()
}

fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl TableStore for SupabaseStore {
    async fn rpc(&self, function: &str, params: Value) -> Result<Value, StoreError> {
        let resp = self
            .authorized(self.client.post(format!(
                "{}/rpc/{}",
                self.rest_url(),
                urlencoding::encode(function)
            )))
            .json(&params)
            .send()
            .await?;

        let text = Self::read_body(resp).await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let resp = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&select_params(query))
            .send()
            .await?;

        Self::read_rows(resp).await
    }

    async fn insert(&self, table: &str, record: Row) -> Result<Vec<Row>, StoreError> {
        let resp = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await?;

        Self::read_rows(resp).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &Filters,
        patch: Row,
    ) -> Result<Vec<Row>, StoreError> {
        if filters.is_empty() {
            return Err(StoreError::UnfilteredWrite("update"));
        }

        let resp = self
            .authorized(self.client.patch(self.table_url(table)))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        Self::read_rows(resp).await
    }

    async fn delete(&self, table: &str, filters: &Filters) -> Result<Vec<Row>, StoreError> {
        if filters.is_empty() {
            return Err(StoreError::UnfilteredWrite("delete"));
        }

        let resp = self
            .authorized(self.client.delete(self.table_url(table)))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        Self::read_rows(resp).await
    }
}
