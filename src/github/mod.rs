//! Pull requests of a contractor's repository.
//!
//! Listing goes through the GitHub server deployment of the OAuth broker,
//! authorized by the contractor's broker session. Results are normalized into
//! `pull_requests` rows keyed by `(contractor_id, pr_number)`.

mod metorial;

pub use metorial::{MetorialGithub, DEFAULT_MCP_URL as DEFAULT_METORIAL_MCP_URL};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::mcp::McpError;
use crate::store::Row;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error("Unexpected pull request listing: {0}")]
    Decode(String),
}

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Every pull request of `repo` (open, closed and merged), as GitHub reports them.
    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        oauth_session_id: &str,
    ) -> Result<Vec<Value>, GithubError>;
}

/// Extract the pull-request objects from a tool's text output.
///
/// Accepts a bare JSON array, an object wrapping one, a single object, or
/// any of those inside a fenced `json` block or surrounded by prose.
pub fn parse_pull_requests(text: &str) -> Result<Vec<Value>, GithubError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = [
        Some(trimmed),
        fenced_json(trimmed),
        bracketed(trimmed, '[', ']'),
        bracketed(trimmed, '{', '}'),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Ok(items_of(value));
        }
    }

    Err(GithubError::Decode(format!(
        "no JSON in tool output: {}",
        trimmed.chars().take(200).collect::<String>()
    )))
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let end = text[start..].find("```")?;
    Some(text[start..start + end].trim())
}

fn bracketed(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn items_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["pull_requests", "pullRequests", "items", "data"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            vec![Value::Object(map)]
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// `pull_requests` row for one GitHub pull request, or `None` without a number.
///
/// A closed pull request with `merged_at` set is stored as `merged`.
pub fn pull_request_row(pr: &Value, contractor: &Row, repo: &RepoRef) -> Option<Row> {
    let first = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| pr.pointer(k))
            .find(|v| !v.is_null())
    };
    let text = |keys: &[&str]| first(keys).and_then(Value::as_str).map(str::to_string);

    let number = first(&["/number", "/pr_number", "/id"])?.clone();
    let now = || chrono::Utc::now().to_rfc3339();

    let mut state = text(&["/state", "/pr_state"])
        .unwrap_or_else(|| "open".to_string())
        .to_lowercase();
    let merged_at = first(&["/merged_at", "/mergedAt"]).cloned();
    if merged_at.is_some() && state == "closed" {
        state = "merged".to_string();
    }

    let url = text(&["/html_url", "/url", "/pr_url"]).unwrap_or_else(|| {
        let number = number.as_str().map_or_else(|| number.to_string(), str::to_string);
        format!("https://github.com/{}/{}/pull/{}", repo.owner, repo.name, number)
    });

    let mut row = Row::new();
    row.insert(
        "contractor_id".into(),
        contractor.get("id").cloned().unwrap_or(Value::Null),
    );
    row.insert("pr_number".into(), number);
    row.insert(
        "pr_title".into(),
        text(&["/title", "/pr_title"])
            .unwrap_or_else(|| "Untitled PR".to_string())
            .into(),
    );
    row.insert("pr_state".into(), state.into());
    row.insert("pr_url".into(), url.into());
    row.insert(
        "pr_author".into(),
        text(&["/user/login", "/author/login", "/author"])
            .unwrap_or_else(|| "unknown".to_string())
            .into(),
    );
    row.insert(
        "pr_created_at".into(),
        text(&["/created_at", "/createdAt", "/created"]).unwrap_or_else(now).into(),
    );
    row.insert(
        "pr_updated_at".into(),
        text(&["/updated_at", "/updatedAt", "/updated"]).unwrap_or_else(now).into(),
    );
    row.insert("pr_merged_at".into(), merged_at.unwrap_or(Value::Null));
    row.insert(
        "amount_payable".into(),
        contractor
            .get("total_amount_payable")
            .cloned()
            .unwrap_or(Value::Null),
    );
    row.insert("is_paid".into(), Value::Bool(false));
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::row;
    use serde_json::json;

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".into(),
            name: "widgets".into(),
        }
    }

    #[test]
    fn listing_shapes() {
        assert_eq!(parse_pull_requests("[]").unwrap(), Vec::<Value>::new());
        assert_eq!(parse_pull_requests("  ").unwrap(), Vec::<Value>::new());
        assert_eq!(
            parse_pull_requests(r#"{"pull_requests": [{"number": 1}]}"#).unwrap(),
            vec![json!({"number": 1})]
        );
        assert_eq!(
            parse_pull_requests("Here you go:\n```json\n[{\"number\": 2}]\n```\nDone.").unwrap(),
            vec![json!({"number": 2})]
        );
        assert_eq!(
            parse_pull_requests("Found: [{\"number\": 3}] in total").unwrap(),
            vec![json!({"number": 3})]
        );
        assert!(matches!(
            parse_pull_requests("rate limited, try later"),
            Err(GithubError::Decode(_))
        ));
    }

    #[test]
    fn merged_pull_request_row() {
        let contractor = row(json!({"id": 7, "total_amount_payable": 250}));
        let pr = json!({
            "number": 12,
            "title": "Fix overflow",
            "state": "closed",
            "merged_at": "2026-01-02T00:00:00Z",
            "html_url": "https://github.com/acme/widgets/pull/12",
            "user": {"login": "octocat"},
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-02T00:00:00Z"
        });

        let row = pull_request_row(&pr, &contractor, &repo()).unwrap();
        assert_eq!(row["contractor_id"], 7);
        assert_eq!(row["pr_number"], 12);
        assert_eq!(row["pr_state"], "merged");
        assert_eq!(row["pr_author"], "octocat");
        assert_eq!(row["pr_merged_at"], "2026-01-02T00:00:00Z");
        assert_eq!(row["amount_payable"], 250);
        assert_eq!(row["is_paid"], false);
    }

    #[test]
    fn sparse_pull_request_gets_defaults() {
        let contractor = row(json!({"id": 7}));
        let row = pull_request_row(&json!({"number": 3}), &contractor, &repo()).unwrap();
        assert_eq!(row["pr_title"], "Untitled PR");
        assert_eq!(row["pr_state"], "open");
        assert_eq!(row["pr_author"], "unknown");
        assert_eq!(row["pr_url"], "https://github.com/acme/widgets/pull/3");
        assert_eq!(row["pr_merged_at"], Value::Null);
        assert!(row["pr_created_at"].is_string());

        assert!(pull_request_row(&json!({"title": "no number"}), &contractor, &repo()).is_none());
    }
}
