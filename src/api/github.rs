//! `GET /api/github-prs`: refresh and list a contractor's pull requests.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query as QueryParams, State};
use axum::Json;
use serde_json::Value;

use super::contractors::{contractor_id, find_contractor};
use super::error::ApiError;
use super::routes::AppState;
use super::types::{ContractorQuery, PullRequestsResponse};
use crate::github::{pull_request_row, RepoRef};
use crate::store::{OrderBy, Query, Row, TableStore};

const PULL_REQUESTS: &str = "pull_requests";

pub async fn github_prs(
    State(state): State<Arc<AppState>>,
    params: Result<QueryParams<ContractorQuery>, QueryRejection>,
) -> Result<Json<PullRequestsResponse>, ApiError> {
    let QueryParams(params) = params?;
    let id = contractor_id(&params)?;

    let store = state.require_store()?;
    let contractor = find_contractor(store.as_ref(), &id).await?;

    let text = |column: &str| {
        contractor
            .get(column)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let session_id = text("metorial_oauth_session_id")
        .ok_or_else(|| ApiError::bad_request("No OAuth session found for this contractor"))?;
    let repo = RepoRef {
        owner: text("repo_owner")
            .or_else(|| text("github_login"))
            .unwrap_or_default(),
        name: text("repo_name").unwrap_or_default(),
    };

    let source = state.require_pull_requests()?;
    let listed = source
        .list_pull_requests(&repo, &session_id)
        .await
        .map_err(|e| {
            tracing::error!(
                "Listing pull requests of {}/{} failed: {}",
                repo.owner,
                repo.name,
                e
            );
            ApiError::internal(format!("Failed to fetch PRs from GitHub: {}", e))
        })?;

    for pr in &listed {
        match pull_request_row(pr, &contractor, &repo) {
            Some(row) => upsert(store.as_ref(), row).await,
            None => tracing::warn!("Skipping pull request without a number"),
        }
    }

    let prs = store
        .select(
            PULL_REQUESTS,
            &Query::all()
                .eq("contractor_id", id)
                .order(OrderBy::desc("pr_created_at")),
        )
        .await?;
    Ok(Json(PullRequestsResponse { prs }))
}

/// Update the row with the same `(contractor_id, pr_number)`, or insert it.
/// Failures are logged; the stored listing is returned either way.
async fn upsert(store: &dyn TableStore, row: Row) {
    let mut key = Row::new();
    for column in ["contractor_id", "pr_number"] {
        key.insert(
            column.to_string(),
            row.get(column).cloned().unwrap_or(Value::Null),
        );
    }

    let result = match store.update(PULL_REQUESTS, &key, row.clone()).await {
        Ok(updated) if updated.is_empty() => store.insert(PULL_REQUESTS, row).await,
        other => other,
    };
    if let Err(e) = result {
        tracing::error!("Storing pull request {} failed: {}", key["pr_number"], e);
    }
}
