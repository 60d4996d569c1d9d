//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::{AgentOutcome, ToolInvocation};
use crate::store::Row;
use crate::tools::ToolResult;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Body of both agent endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatRequest {
    /// The message, when present and not blank.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub tool_results: Vec<ToolResult>,
}

impl From<AgentOutcome> for ChatResponse {
    fn from(outcome: AgentOutcome) -> Self {
        Self {
            success: true,
            text: outcome.text,
            tool_calls: outcome.tool_calls,
            tool_results: outcome.tool_results,
        }
    }
}

// ==================== Contractors ====================

/// New contractor as the dashboard submits it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractorRequest {
    pub github_login: Option<String>,
    pub person_name: Option<String>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub wallet_address: Option<String>,
    pub role: Option<String>,
    #[serde(default, rename = "trackPRs", alias = "trackPrs")]
    pub track_prs: Option<bool>,
    /// Number or numeric string
    pub total_amount_payable: Option<Value>,
    pub metorial_oauth_session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorSearch {
    pub github_login: Option<String>,
    pub wallet_address: Option<String>,
    pub repo_name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractorsResponse {
    pub contractors: Vec<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullRequestsResponse {
    pub prs: Vec<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractorResponse {
    pub contractor: Row,
}

// ==================== Payments ====================

/// `?contractorId=` of the per-contractor endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorQuery {
    pub contractor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorBrief {
    pub id: Value,
    pub person_name: Value,
    pub wallet_address: Value,
    pub total_amount_payable: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTotals {
    pub total_paid: f64,
    pub total_pending: f64,
    pub remaining_amount: f64,
    pub total_amount_payable: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummaryResponse {
    pub contractor: ContractorBrief,
    pub summary: PaymentTotals,
    pub payments: Vec<Row>,
}

// ==================== GitHub OAuth ====================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub oauth_session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCreated {
    pub oauth_session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthWaitResponse {
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
