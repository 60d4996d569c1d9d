//! `POST /api/github-oauth`: create a broker session or wait for it.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::error::ApiError;
use super::routes::AppState;
use super::types::{OAuthCreated, OAuthRequest, OAuthWaitResponse};
use crate::oauth::{wait_for_completion, SessionState};

pub async fn github_oauth(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OAuthRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    match request.action.as_deref() {
        Some("create") => {
            let broker = state.require_oauth()?;
            let session = broker.create_session().await?;
            Ok(Json(OAuthCreated {
                oauth_session_id: session.id,
                url: session.url,
            })
            .into_response())
        }
        Some("wait") => {
            let session_id = request
                .oauth_session_id
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| ApiError::bad_request("oauthSessionId is required"))?;
            let broker = state.require_oauth()?;
            let policy = state.config.oauth.poll_policy();

            let response = match wait_for_completion(broker.as_ref(), &session_id, policy).await {
                Ok(SessionState::Completed) => OAuthWaitResponse {
                    completed: true,
                    oauth_session_id: Some(session_id),
                    message: None,
                },
                Ok(SessionState::Pending) => not_completed("OAuth not completed yet"),
                Ok(SessionState::Failed) => not_completed("OAuth session failed or expired"),
                Err(e) => {
                    tracing::warn!("OAuth status check for {} failed: {}", session_id, e);
                    not_completed("Error checking OAuth status")
                }
            };
            Ok(Json(response).into_response())
        }
        _ => Err(ApiError::bad_request(
            "Invalid action. Use \"create\" or \"wait\"",
        )),
    }
}

fn not_completed(message: &str) -> OAuthWaitResponse {
    OAuthWaitResponse {
        completed: false,
        oauth_session_id: None,
        message: Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::testing;
    use crate::config::Config;
    use crate::llm::LlmClient;
    use crate::oauth::{OAuthBroker, OAuthError, OAuthSession};
    use crate::payments::testing::FakePayments;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    struct FixedBroker(Result<SessionState, u16>);

    #[async_trait]
    impl OAuthBroker for FixedBroker {
        async fn create_session(&self) -> Result<OAuthSession, OAuthError> {
            Ok(OAuthSession {
                id: "oas_42".into(),
                url: "https://broker.test/oauth/oas_42".into(),
            })
        }

        async fn session_state(&self, _session_id: &str) -> Result<SessionState, OAuthError> {
            self.0.map_err(|status| OAuthError::Http {
                status,
                body: "boom".into(),
            })
        }
    }

    fn state(broker: FixedBroker) -> Arc<AppState> {
        let config = Config::from_lookup(|key| match key {
            "OAUTH_POLL_ATTEMPTS" => Some("2".to_string()),
            "OAUTH_POLL_DELAY_MS" => Some("1".to_string()),
            _ => None,
        })
        .unwrap();
        Arc::new(
            AppState::new(
                config,
                None::<Arc<dyn LlmClient>>,
                None,
                Arc::new(FakePayments::succeeding("")),
                Some(Arc::new(broker) as Arc<dyn OAuthBroker>),
            )
            .unwrap(),
        )
    }

    async fn call(state: Arc<AppState>, body: Value) -> Result<Value, ApiError> {
        let request = serde_json::from_value(body).unwrap();
        let response = github_oauth(State(state), Ok(Json(request))).await?;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        Ok(serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn create_returns_session() {
        let body = call(state(FixedBroker(Ok(SessionState::Pending))), json!({"action": "create"}))
            .await
            .unwrap();
        assert_eq!(body["oauthSessionId"], "oas_42");
        assert_eq!(body["url"], "https://broker.test/oauth/oas_42");
    }

    #[tokio::test]
    async fn wait_reports_completion() {
        let body = call(
            state(FixedBroker(Ok(SessionState::Completed))),
            json!({"action": "wait", "oauthSessionId": "oas_42"}),
        )
        .await
        .unwrap();
        assert_eq!(body, json!({"completed": true, "oauthSessionId": "oas_42"}));
    }

    #[tokio::test]
    async fn wait_still_pending_is_not_an_error() {
        let body = call(
            state(FixedBroker(Ok(SessionState::Pending))),
            json!({"action": "wait", "oauthSessionId": "oas_42"}),
        )
        .await
        .unwrap();
        assert_eq!(body["completed"], false);
        assert!(body.get("oauthSessionId").is_none());
    }

    #[tokio::test]
    async fn broker_failure_while_waiting_is_reported_in_body() {
        let body = call(
            state(FixedBroker(Err(502))),
            json!({"action": "wait", "oauthSessionId": "oas_42"}),
        )
        .await
        .unwrap();
        assert_eq!(
            body,
            json!({"completed": false, "message": "Error checking OAuth status"})
        );
    }

    #[tokio::test]
    async fn bad_requests() {
        let broker = || state(FixedBroker(Ok(SessionState::Completed)));

        let err = call(broker(), json!({"action": "wait"})).await.unwrap_err();
        assert_eq!(err.message(), "oauthSessionId is required");

        let err = call(broker(), json!({"action": "refresh"})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid action. Use \"create\" or \"wait\"");
    }

    #[tokio::test]
    async fn broker_not_configured() {
        let state = testing::state(None, None, Arc::new(FakePayments::succeeding("")));
        let err = call(state, json!({"action": "create"})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("METORIAL"));
    }
}
