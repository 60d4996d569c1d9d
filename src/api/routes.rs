//! Router, shared state and server lifecycle.

use std::sync::Arc;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ConfigError, StoreBackend};
use crate::github::{MetorialGithub, PullRequestSource};
use crate::llm::{LlmClient, OpenAiClient, RetryConfig};
use crate::oauth::{MetorialClient, OAuthBroker};
use crate::payments::{LocusPaymentAgent, PaymentBackend};
use crate::store::{InMemoryTableStore, MemoryTable, SupabaseStore, TableStore};
use crate::tools::ToolRegistry;

use super::agent;
use super::contractors;
use super::github;
use super::oauth;
use super::types::HealthResponse;

/// Shared application state.
///
/// Collaborators whose credentials are missing are `None`; endpoints that
/// need them answer with a configuration error before doing any work.
pub struct AppState {
    pub config: Config,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub store: Option<Arc<dyn TableStore>>,
    pub oauth: Option<Arc<dyn OAuthBroker>>,
    pub pull_requests: Option<Arc<dyn PullRequestSource>>,
    /// Registry of the payment assistant
    pub payment_tools: Arc<ToolRegistry>,
    /// Registry of the full assistant (needs a table store)
    pub full_tools: Option<Arc<ToolRegistry>>,
}

impl AppState {
    pub fn new(
        config: Config,
        llm: Option<Arc<dyn LlmClient>>,
        store: Option<Arc<dyn TableStore>>,
        payments: Arc<dyn PaymentBackend>,
        oauth: Option<Arc<dyn OAuthBroker>>,
    ) -> Result<Self, ConfigError> {
        let payment_tools = Arc::new(ToolRegistry::payments(Arc::clone(&payments))?);
        let full_tools = match &store {
            Some(store) => Some(Arc::new(ToolRegistry::full(
                Arc::clone(store),
                Arc::clone(&payments),
            )?)),
            None => None,
        };

        Ok(Self {
            config,
            llm,
            store,
            oauth,
            pull_requests: None,
            payment_tools,
            full_tools,
        })
    }

    pub fn with_pull_requests(mut self, source: Arc<dyn PullRequestSource>) -> Self {
        self.pull_requests = Some(source);
        self
    }

    /// Build every collaborator the configuration has credentials for.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let llm: Option<Arc<dyn LlmClient>> = config.openai_api_key.as_deref().map(|key| {
            let client = OpenAiClient::with_base_url(key, &config.llm_base_url)
                .with_retry_config(RetryConfig::with_max_retries(config.llm_max_retries));
            Arc::new(client) as Arc<dyn LlmClient>
        });

        let store: Option<Arc<dyn TableStore>> = match config.store.backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory table store (data is not persisted)");
                Some(Arc::new(local_store()) as Arc<dyn TableStore>)
            }
            StoreBackend::Supabase => match config.store.supabase_credentials() {
                Ok((url, key)) => {
                    Some(Arc::new(SupabaseStore::new(url, key)) as Arc<dyn TableStore>)
                }
                Err(e) => {
                    tracing::warn!("Table store disabled: {}", e);
                    None
                }
            },
        };

        let oauth: Option<Arc<dyn OAuthBroker>> = match config.oauth.require_metorial() {
            Ok((key, deployment)) => Some(Arc::new(MetorialClient::new(
                &config.oauth.metorial_base_url,
                key,
                deployment,
            )) as Arc<dyn OAuthBroker>),
            Err(e) => {
                tracing::warn!("GitHub OAuth disabled: {}", e);
                None
            }
        };

        let pull_requests = config.oauth.require_metorial().ok().map(|(key, deployment)| {
            Arc::new(MetorialGithub::new(&config.oauth.metorial_mcp_url, key, deployment))
                as Arc<dyn PullRequestSource>
        });

        let payments: Arc<dyn PaymentBackend> =
            Arc::new(LocusPaymentAgent::from_config(&config, llm.clone()));

        let state = Self::new(config, llm, store, payments, oauth)?;
        Ok(match pull_requests {
            Some(source) => state.with_pull_requests(source),
            None => state,
        })
    }

    pub fn require_llm(&self) -> Result<Arc<dyn LlmClient>, ConfigError> {
        self.llm
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }

    pub fn require_store(&self) -> Result<Arc<dyn TableStore>, ConfigError> {
        match &self.store {
            Some(store) => Ok(Arc::clone(store)),
            None => Err(missing_store(&self.config)),
        }
    }

    pub fn require_full_tools(&self) -> Result<Arc<ToolRegistry>, ConfigError> {
        match &self.full_tools {
            Some(tools) => Ok(Arc::clone(tools)),
            None => Err(missing_store(&self.config)),
        }
    }

    pub fn require_oauth(&self) -> Result<Arc<dyn OAuthBroker>, ConfigError> {
        match &self.oauth {
            Some(oauth) => Ok(Arc::clone(oauth)),
            None => Err(missing_metorial(&self.config)),
        }
    }

    pub fn require_pull_requests(&self) -> Result<Arc<dyn PullRequestSource>, ConfigError> {
        match &self.pull_requests {
            Some(source) => Ok(Arc::clone(source)),
            None => Err(missing_metorial(&self.config)),
        }
    }
}

fn missing_metorial(config: &Config) -> ConfigError {
    config
        .oauth
        .require_metorial()
        .err()
        .unwrap_or_else(|| ConfigError::MissingEnvVar("METORIAL_API_KEY".to_string()))
}

fn missing_store(config: &Config) -> ConfigError {
    config
        .store
        .supabase_credentials()
        .err()
        .unwrap_or_else(|| ConfigError::MissingEnvVar("SUPABASE_URL".to_string()))
}

/// Empty dashboard tables for `TABLE_STORE=memory`.
fn local_store() -> InMemoryTableStore {
    InMemoryTableStore::new()
        .with_table(
            "contractors",
            MemoryTable::new()
                .with_auto_id()
                .with_timestamp("created_at")
                .with_default("track_prs", serde_json::Value::Bool(false)),
        )
        .with_table(
            "payments",
            MemoryTable::new()
                .with_auto_id()
                .with_timestamp("created_at")
                .with_required("contractor_id"),
        )
        .with_table(
            "pull_requests",
            MemoryTable::new()
                .with_auto_id()
                .with_required("contractor_id")
                .with_required("pr_number"),
        )
}

/// All routes, with tracing and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agent/chat", post(agent::payment_chat))
        .route("/agent/assistant", post(agent::assistant_chat))
        .route(
            "/api/contractors",
            get(contractors::list_contractors).post(contractors::create_contractor),
        )
        .route("/api/contractors/search", get(contractors::search_contractors))
        .route("/api/payments/summary", get(contractors::payment_summary))
        .route("/api/github-oauth", post(oauth::github_oauth))
        .route("/api/github-prs", get(github::github_prs))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok_with_timestamp() {
        let Json(body) = health().await;
        assert_eq!(body.status, "OK");
        assert!(chrono::DateTime::parse_from_rfc3339(&body.timestamp).is_ok());
    }

    #[test]
    fn missing_collaborators_surface_as_config_errors() {
        let config = Config::from_lookup(|_| None).unwrap();
        let state = AppState::from_config(config).unwrap();

        assert!(state.llm.is_none());
        assert!(matches!(
            state.require_llm(),
            Err(ConfigError::MissingEnvVar(name)) if name == "OPENAI_API_KEY"
        ));
        assert!(matches!(
            state.require_full_tools(),
            Err(ConfigError::MissingEnvVar(name)) if name == "SUPABASE_URL"
        ));
        assert!(state.require_oauth().is_err());
        assert_eq!(state.payment_tools.len(), 1);
    }

    #[test]
    fn memory_backend_enables_full_assistant() {
        let state = AppState::from_config(testing::config()).unwrap();
        assert_eq!(state.require_full_tools().unwrap().len(), 6);
    }
}
