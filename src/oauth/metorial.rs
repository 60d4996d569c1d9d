//! Metorial OAuth session API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{OAuthBroker, OAuthError, OAuthSession, SessionState};

pub const DEFAULT_BASE_URL: &str = "https://api.metorial.com";

pub struct MetorialClient {
    client: Client,
    base_url: String,
    api_key: String,
    server_deployment_id: String,
}

impl MetorialClient {
    pub fn new(base_url: &str, api_key: &str, server_deployment_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            server_deployment_id: server_deployment_id.to_string(),
        }
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, OAuthError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(OAuthError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| OAuthError::Decode(e.to_string()))
    }
}

/// Map a session document to a state. The broker has reported completion
/// as `status`, as a `completed` flag, and nested under `oauth_session`.
fn session_state_of(doc: &Value) -> SessionState {
    if doc.get("completed").and_then(Value::as_bool) == Some(true) {
        return SessionState::Completed;
    }

    let status = doc
        .get("status")
        .or_else(|| doc.pointer("/oauth_session/status"))
        .or_else(|| doc.pointer("/oauthSession/status"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match status {
        "completed" => SessionState::Completed,
        "failed" | "expired" | "cancelled" | "canceled" => SessionState::Failed,
        _ => SessionState::Pending,
    }
}

#[async_trait]
impl OAuthBroker for MetorialClient {
    async fn create_session(&self) -> Result<OAuthSession, OAuthError> {
        let resp = self
            .client
            .post(format!("{}/oauth-sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "server_deployment_id": self.server_deployment_id }))
            .send()
            .await?;

        let doc = Self::read_json(resp).await?;
        let session: OAuthSession =
            serde_json::from_value(doc).map_err(|e| OAuthError::Decode(e.to_string()))?;
        tracing::info!("Created OAuth session {}", session.id);
        Ok(session)
    }

    async fn session_state(&self, session_id: &str) -> Result<SessionState, OAuthError> {
        let resp = self
            .client
            .get(format!(
                "{}/oauth-sessions/{}",
                self.base_url,
                urlencoding::encode(session_id)
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Ok(session_state_of(&Self::read_json(resp).await?))
    }
}
