//! Pull-request listing through a Metorial GitHub server deployment.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{parse_pull_requests, GithubError, PullRequestSource, RepoRef};
use crate::mcp::McpClient;

pub const DEFAULT_MCP_URL: &str = "https://mcp.metorial.com";

const LIST_TOOL: &str = "list_pull_requests";

/// Calls the deployment's `list_pull_requests` tool over MCP, one connection
/// per listing, authorized by the contractor's OAuth session.
pub struct MetorialGithub {
    mcp_url: String,
    api_key: String,
    server_deployment_id: String,
}

impl MetorialGithub {
    pub fn new(mcp_url: &str, api_key: &str, server_deployment_id: &str) -> Self {
        Self {
            mcp_url: mcp_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            server_deployment_id: server_deployment_id.to_string(),
        }
    }

    fn endpoint(&self, oauth_session_id: &str) -> String {
        format!(
            "{}/{}/mcp?oauth_session_id={}",
            self.mcp_url,
            urlencoding::encode(&self.server_deployment_id),
            urlencoding::encode(oauth_session_id)
        )
    }
}

#[async_trait]
impl PullRequestSource for MetorialGithub {
    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        oauth_session_id: &str,
    ) -> Result<Vec<Value>, GithubError> {
        let client = McpClient::connect(&self.endpoint(oauth_session_id), &self.api_key).await?;
        let output = client
            .call_tool(
                LIST_TOOL,
                json!({
                    "owner": repo.owner,
                    "repo": repo.name,
                    "state": "all",
                    "per_page": 100
                }),
            )
            .await?;

        let prs = parse_pull_requests(&output)?;
        tracing::info!(
            "Listed {} pull request(s) of {}/{}",
            prs.len(),
            repo.owner,
            repo.name
        );
        Ok(prs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_deployment_and_session() {
        let github = MetorialGithub::new("https://mcp.example.test/", "key", "dep 1");
        assert_eq!(
            github.endpoint("oas/42"),
            "https://mcp.example.test/dep%201/mcp?oauth_session_id=oas%2F42"
        );
    }

    #[tokio::test]
    async fn unreachable_deployment_is_mcp_error() {
        let github = MetorialGithub::new("http://127.0.0.1:9", "key", "dep_1");
        let repo = RepoRef {
            owner: "acme".into(),
            name: "widgets".into(),
        };
        let err = github.list_pull_requests(&repo, "oas_1").await.unwrap_err();
        assert!(matches!(err, GithubError::Mcp(_)));
    }
}
