//! payroll-agent - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the agent and dashboard API.

use payroll_agent::{api, config::Config};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payroll_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, store={:?}",
        config.default_model, config.store.backend
    );
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; agent endpoints will fail");
    }
    if config.locus_api_key.is_none() {
        warn!("LOCUS_API_KEY is not set; payments will fail");
    }

    api::serve(config).await?;

    Ok(())
}
