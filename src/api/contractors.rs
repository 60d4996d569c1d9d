//! Dashboard endpoints over the `contractors` and `payments` tables.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query as QueryParams, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use super::error::ApiError;
use super::routes::AppState;
use super::types::{
    ContractorBrief, ContractorQuery, ContractorResponse, ContractorSearch, ContractorsResponse,
    CreateContractorRequest, PaymentSummaryResponse, PaymentTotals,
};
use crate::store::{OrderBy, Query, Row, TableStore};

const CONTRACTORS: &str = "contractors";
const PAYMENTS: &str = "payments";

/// `GET /api/contractors`
pub async fn list_contractors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ContractorsResponse>, ApiError> {
    let store = state.require_store()?;
    let contractors = store
        .select(CONTRACTORS, &Query::all().order(OrderBy::desc("created_at")))
        .await?;
    Ok(Json(ContractorsResponse { contractors }))
}

/// `POST /api/contractors`
pub async fn create_contractor(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateContractorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContractorResponse>), ApiError> {
    let Json(request) = payload?;

    let missing = missing_fields(&request);
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }
    let record = contractor_row(&request)?;

    let store = state.require_store()?;
    let mut stored = store.insert(CONTRACTORS, record).await?;
    if stored.is_empty() {
        return Err(ApiError::internal("Insert returned no contractor"));
    }
    let contractor = stored.swap_remove(0);

    let id = contractor.get("id").cloned().unwrap_or_default();
    tracing::info!(
        "Created contractor {} ({})",
        id,
        request.github_login.as_deref().unwrap_or_default()
    );
    Ok((StatusCode::CREATED, Json(ContractorResponse { contractor })))
}

/// `GET /api/contractors/search`
pub async fn search_contractors(
    State(state): State<Arc<AppState>>,
    params: Result<QueryParams<ContractorSearch>, QueryRejection>,
) -> Result<Json<ContractorsResponse>, ApiError> {
    let QueryParams(search) = params?;

    let mut query = Query::all().order(OrderBy::desc("created_at"));
    for (column, value) in [
        ("github_login", &search.github_login),
        ("wallet_address", &search.wallet_address),
        ("repo_name", &search.repo_name),
        ("role", &search.role),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            query = query.eq(column, value);
        }
    }

    let store = state.require_store()?;
    let contractors = store.select(CONTRACTORS, &query).await?;
    Ok(Json(ContractorsResponse { contractors }))
}

/// `GET /api/payments/summary`
pub async fn payment_summary(
    State(state): State<Arc<AppState>>,
    params: Result<QueryParams<ContractorQuery>, QueryRejection>,
) -> Result<Json<PaymentSummaryResponse>, ApiError> {
    let QueryParams(params) = params?;
    let id = contractor_id(&params)?;

    let store = state.require_store()?;
    let contractor = find_contractor(store.as_ref(), &id).await?;

    let payments = store
        .select(
            PAYMENTS,
            &Query::all()
                .eq("contractor_id", id)
                .order(OrderBy::desc("created_at")),
        )
        .await?;

    let summary = summarize(&contractor, &payments);
    let field = |name: &str| contractor.get(name).cloned().unwrap_or(Value::Null);

    Ok(Json(PaymentSummaryResponse {
        contractor: ContractorBrief {
            id: field("id"),
            person_name: field("person_name"),
            wallet_address: field("wallet_address"),
            total_amount_payable: summary.total_amount_payable,
        },
        summary,
        payments,
    }))
}

/// Required fields that are absent, blank or zero, in request order.
fn missing_fields(request: &CreateContractorRequest) -> Vec<&'static str> {
    let blank = |value: &Option<String>| value.as_deref().map_or(true, str::is_empty);

    let mut missing = Vec::new();
    for (name, value) in [
        ("githubLogin", &request.github_login),
        ("personName", &request.person_name),
        ("repoName", &request.repo_name),
        ("walletAddress", &request.wallet_address),
        ("role", &request.role),
    ] {
        if blank(value) {
            missing.push(name);
        }
    }
    if !is_truthy(request.total_amount_payable.as_ref()) {
        missing.push("totalAmountPayable");
    }
    missing
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(_) => true,
    }
}

/// Snake-case row for a validated request.
fn contractor_row(request: &CreateContractorRequest) -> Result<Row, ApiError> {
    let amount = request
        .total_amount_payable
        .as_ref()
        .and_then(amount_of)
        .ok_or_else(|| ApiError::bad_request("totalAmountPayable must be a number"))?;

    let mut row = Row::new();
    let mut put = |column: &str, value: &Option<String>| {
        if let Some(value) = value {
            row.insert(column.to_string(), Value::String(value.clone()));
        }
    };
    put("github_login", &request.github_login);
    put("person_name", &request.person_name);
    put("repo_owner", &request.repo_owner);
    put("repo_name", &request.repo_name);
    put("wallet_address", &request.wallet_address);
    put("role", &request.role);
    put("metorial_oauth_session_id", &request.metorial_oauth_session_id);

    row.insert(
        "track_prs".to_string(),
        Value::Bool(request.track_prs.unwrap_or(false)),
    );
    row.insert("total_amount_payable".to_string(), Value::from(amount));
    Ok(row)
}

/// Numeric value of a number or numeric string (Postgres `numeric` arrives as text).
fn amount_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The `contractorId` parameter as a store value; 400 when absent or blank.
pub(super) fn contractor_id(params: &ContractorQuery) -> Result<Value, ApiError> {
    params
        .contractor_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(id_value)
        .ok_or_else(|| ApiError::bad_request("contractorId is required"))
}

/// The contractor with `id`; 404 when the lookup fails or finds nothing.
pub(super) async fn find_contractor(store: &dyn TableStore, id: &Value) -> Result<Row, ApiError> {
    store
        .select(CONTRACTORS, &Query::all().eq("id", id.clone()).limit(1))
        .await
        .ok()
        .and_then(|rows| rows.into_iter().next())
        .ok_or_else(|| ApiError::not_found("Contractor not found"))
}

/// Integer ids compare as numbers; anything else (uuids) as strings.
fn id_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn summarize(contractor: &Row, payments: &[Row]) -> PaymentTotals {
    let total_with_status = |status: &str| -> f64 {
        payments
            .iter()
            .filter(|p| p.get("payment_status").and_then(Value::as_str) == Some(status))
            .filter_map(|p| p.get("amount").and_then(amount_of))
            .sum()
    };

    let total_paid = total_with_status("completed");
    let total_pending = total_with_status("pending");
    let total_amount_payable = contractor
        .get("total_amount_payable")
        .and_then(amount_of)
        .unwrap_or(0.0);

    PaymentTotals {
        total_paid,
        total_pending,
        remaining_amount: total_amount_payable - total_paid,
        total_amount_payable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::testing;
    use crate::payments::testing::FakePayments;
    use crate::store::{row, InMemoryTableStore, TableStore};
    use serde_json::json;

    fn request(body: Value) -> CreateContractorRequest {
        serde_json::from_value(body).unwrap()
    }

    fn complete_request() -> Value {
        json!({
            "githubLogin": "octocat",
            "personName": "Mona Lisa",
            "repoName": "hello-world",
            "walletAddress": "0xabc",
            "role": "frontend",
            "totalAmountPayable": "1500.50",
            "trackPRs": true
        })
    }

    async fn seeded() -> Arc<InMemoryTableStore> {
        let store = testing::dashboard_store();
        for (login, role) in [("alice", "backend"), ("bob", "frontend"), ("carol", "backend")] {
            store
                .insert(
                    CONTRACTORS,
                    row(json!({
                        "github_login": login,
                        "person_name": login,
                        "role": role,
                        "wallet_address": format!("0x{login}"),
                        "total_amount_payable": "1000"
                    })),
                )
                .await
                .unwrap();
        }
        store
    }

    fn state_with(store: Arc<InMemoryTableStore>) -> Arc<AppState> {
        testing::state(None, Some(store), Arc::new(FakePayments::succeeding("")))
    }

    #[test]
    fn missing_fields_follow_falsy_rules() {
        assert!(missing_fields(&request(complete_request())).is_empty());

        let mut body = complete_request();
        body["personName"] = json!("");
        body["totalAmountPayable"] = json!(0);
        body.as_object_mut().unwrap().remove("role");
        assert_eq!(
            missing_fields(&request(body)),
            vec!["personName", "role", "totalAmountPayable"]
        );
    }

    #[test]
    fn contractor_row_is_snake_case_with_numeric_amount() {
        let row = contractor_row(&request(complete_request())).unwrap();
        assert_eq!(row["github_login"], "octocat");
        assert_eq!(row["track_prs"], true);
        assert_eq!(row["total_amount_payable"], 1500.5);
        assert!(!row.contains_key("repo_owner"));

        let mut body = complete_request();
        body["totalAmountPayable"] = json!("lots");
        let err = contractor_row(&request(body)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn summary_counts_completed_and_pending_only() {
        let contractor = row(json!({"id": 1, "total_amount_payable": "1000"}));
        let payments = vec![
            row(json!({"amount": 200, "payment_status": "completed"})),
            row(json!({"amount": "50.5", "payment_status": "completed"})),
            row(json!({"amount": 100, "payment_status": "pending"})),
            row(json!({"amount": 999, "payment_status": "failed"})),
        ];
        assert_eq!(
            summarize(&contractor, &payments),
            PaymentTotals {
                total_paid: 250.5,
                total_pending: 100.0,
                remaining_amount: 749.5,
                total_amount_payable: 1000.0,
            }
        );
    }

    #[test]
    fn numeric_ids_parse_as_integers() {
        assert_eq!(id_value("42"), json!(42));
        assert_eq!(id_value("7f3c-uuid"), json!("7f3c-uuid"));
    }

    #[tokio::test]
    async fn create_then_list_newest_first() {
        let store = seeded().await;
        let state = state_with(store.clone());

        let (status, Json(created)) =
            create_contractor(State(state.clone()), Ok(Json(request(complete_request()))))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.contractor["id"], 4);
        assert!(created.contractor.contains_key("created_at"));

        let Json(listed) = list_contractors(State(state)).await.unwrap();
        assert_eq!(listed.contractors.len(), 4);
        assert_eq!(listed.contractors[0]["github_login"], "octocat");
    }

    #[tokio::test]
    async fn create_reports_missing_fields() {
        let state = state_with(testing::dashboard_store());
        let err = create_contractor(State(state), Ok(Json(request(json!({"role": "x"})))))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message(),
            "Missing required fields: githubLogin, personName, repoName, walletAddress, totalAmountPayable"
        );
    }

    #[tokio::test]
    async fn search_applies_supplied_filters() {
        let state = state_with(seeded().await);
        let search = ContractorSearch {
            role: Some("backend".into()),
            github_login: Some(String::new()),
            ..Default::default()
        };

        let Json(found) = search_contractors(State(state), Ok(QueryParams(search)))
            .await
            .unwrap();
        let logins: Vec<_> = found
            .contractors
            .iter()
            .map(|c| c["github_login"].as_str().unwrap())
            .collect();
        assert_eq!(logins.len(), 2);
        assert!(logins.contains(&"alice") && logins.contains(&"carol"));
    }

    #[tokio::test]
    async fn summary_for_seeded_contractor() {
        let store = seeded().await;
        store
            .insert(
                PAYMENTS,
                row(json!({"contractor_id": 2, "amount": 300, "payment_status": "completed"})),
            )
            .await
            .unwrap();
        store
            .insert(
                PAYMENTS,
                row(json!({"contractor_id": 1, "amount": 10, "payment_status": "completed"})),
            )
            .await
            .unwrap();
        let state = state_with(store);

        let Json(summary) = payment_summary(
            State(state),
            Ok(QueryParams(ContractorQuery {
                contractor_id: Some("2".into()),
            })),
        )
        .await
        .unwrap();

        assert_eq!(summary.contractor.person_name, "bob");
        assert_eq!(summary.summary.total_paid, 300.0);
        assert_eq!(summary.summary.remaining_amount, 700.0);
        assert_eq!(summary.payments.len(), 1);
    }

    #[tokio::test]
    async fn summary_errors() {
        let state = state_with(seeded().await);

        let err = payment_summary(
            State(state.clone()),
            Ok(QueryParams(ContractorQuery { contractor_id: None })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "contractorId is required");

        let err = payment_summary(
            State(state),
            Ok(QueryParams(ContractorQuery {
                contractor_id: Some("99".into()),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
