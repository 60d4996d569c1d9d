//! Agent endpoints: one session per request.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::error::ApiError;
use super::routes::AppState;
use super::types::{ChatRequest, ChatResponse};
use crate::agents::{prompts, Orchestrator};

fn require_message(payload: Result<Json<ChatRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = payload?;
    request
        .message()
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Message is required"))
}

/// `POST /agent/chat`: payment assistant with the single payment tool.
pub async fn payment_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = require_message(payload)?;
    let llm = state.require_llm()?;
    state.config.require_locus_key()?;

    let session = Orchestrator::new(
        llm,
        state.config.default_model.as_str(),
        Arc::clone(&state.payment_tools),
        prompts::PAYMENT_ASSISTANT,
    )
    .with_max_iterations(state.config.max_iterations);

    let outcome = session.run(&message).await?;
    Ok(Json(outcome.into()))
}

/// `POST /agent/assistant`: database tools plus the payment tool, ungated.
pub async fn assistant_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = require_message(payload)?;
    let llm = state.require_llm()?;
    let tools = state.require_full_tools()?;
    state.config.require_locus_key()?;

    let session = Orchestrator::new(
        llm,
        state.config.default_model.as_str(),
        tools,
        prompts::DATABASE_ASSISTANT,
    )
    .with_max_iterations(state.config.max_iterations);

    let outcome = session.run(&message).await?;
    Ok(Json(outcome.into()))
}
