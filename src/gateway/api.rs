//! Route table and request handlers.
//!
//! Every handler does the same three things: decode parameters, make one
//! adapter call, encode the response. No session state, no token→case
//! bookkeeping; the runtime owns all of that. Tokens arrive as standard
//! padded base64 path segments and are passed through as opaque bytes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

use crate::check::types::{
    BackgroundCheckInput, BackgroundCheckStatus, CandidateTodo, CaseState, ConsentResult,
    Report, ResearcherTodo, SearchResult,
};
use crate::client::{BACKGROUND_CHECK_WORKFLOW, WorkflowClient};
use crate::errors::RuntimeError;
use crate::ids;
use crate::runtime::engine::{QUERY_CANDIDATE_TODOS, QUERY_RESEARCHER_TODOS, QUERY_STATUS};
use crate::workflow::ActivityOutcome;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    /// The process-wide runtime client, connected once at startup.
    pub client: WorkflowClient,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Gone(msg) => (StatusCode::GONE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Conflict(_) => ApiError::Conflict(err.to_string()),
            RuntimeError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RuntimeError::UnknownToken => ApiError::Gone(err.to_string()),
            RuntimeError::InvalidPayload(_) => ApiError::BadRequest(err.to_string()),
            RuntimeError::Transient(_) => ApiError::Internal(err.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/checks", get(list_checks).post(create_check))
        .route("/checks/{id}", get(check_status))
        .route("/checks/{id}/cancel", post(cancel_check))
        .route("/checks/{id}/report", get(check_report))
        .route("/checks/{id}/consent", post(deliver_consent))
        .route("/checks/{id}/decline", post(decline_check))
        .route("/checks/{id}/search", post(save_search_result))
        .route("/todos/candidate/{email}", get(candidate_todo_list))
        .route("/todos/researcher/{email}", get(researcher_todo_list))
        .route("/health", get(health))
}

// ── Helpers ───────────────────────────────────────────────────────────

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn decode_token(segment: &str) -> Result<Vec<u8>, ApiError> {
    STANDARD
        .decode(segment.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Bad token: {e}")))
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.contains('@') && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Bad email: {email}")))
    }
}

fn fetch_status(client: &WorkflowClient, email: &str) -> Result<BackgroundCheckStatus, ApiError> {
    let encoded =
        client.query_workflow(&ids::background_check_workflow_id(email), QUERY_STATUS)?;
    serde_json::from_value(encoded).map_err(|e| ApiError::Internal(e.to_string()))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

/// Open cases, i.e. workflows whose IDs begin with `BackgroundCheck-`.
async fn list_checks(
    State(state): State<SharedState>,
) -> Result<Json<Vec<BackgroundCheckInput>>, ApiError> {
    let encoded = state.client.list_workflows("BackgroundCheck-")?;
    let mut checks = Vec::with_capacity(encoded.len());
    for value in encoded {
        checks.push(
            serde_json::from_value(value).map_err(|e| ApiError::Internal(e.to_string()))?,
        );
    }
    Ok(Json(checks))
}

async fn create_check(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let input: BackgroundCheckInput = parse_body(&body)?;
    validate_email(&input.email)?;
    let workflow_id = ids::background_check_workflow_id(&input.email);
    let args =
        serde_json::to_value(&input).map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .client
        .start_workflow(&workflow_id, BACKGROUND_CHECK_WORKFLOW, args)?;
    Ok(StatusCode::CREATED)
}

async fn check_status(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<Json<BackgroundCheckStatus>, ApiError> {
    Ok(Json(fetch_status(&state.client, &email)?))
}

async fn cancel_check(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .client
        .cancel_workflow(&ids::background_check_workflow_id(&email))?;
    Ok(StatusCode::NO_CONTENT)
}

/// The report exists iff the case completed; any other live or terminal
/// state answers 409.
async fn check_report(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let status = fetch_status(&state.client, &email)?;
    match (status.state, status.report) {
        (CaseState::Completed, Some(report)) => Ok(Json(report)),
        _ => Err(ApiError::Conflict(format!(
            "No report: check for {email} has not completed"
        ))),
    }
}

async fn deliver_consent(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let token = decode_token(&token)?;
    let result: ConsentResult = parse_body(&body)?;
    let value =
        serde_json::to_value(result).map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .client
        .complete_activity(&token, ActivityOutcome::Completed(value))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Shortcut for completing the consent activity with `{consent: false}`.
async fn decline_check(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token = decode_token(&token)?;
    let value = serde_json::to_value(ConsentResult { consent: false })
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .client
        .complete_activity(&token, ActivityOutcome::Completed(value))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn save_search_result(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let token = decode_token(&token)?;
    let result: SearchResult = parse_body(&body)?;
    state
        .client
        .complete_activity(&token, ActivityOutcome::Completed(result.payload()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn candidate_todo_list(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<CandidateTodo>>, ApiError> {
    let encoded = state
        .client
        .query_workflow(&ids::candidate_workflow_id(&email), QUERY_CANDIDATE_TODOS)?;
    let todos =
        serde_json::from_value(encoded).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(todos))
}

async fn researcher_todo_list(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<ResearcherTodo>>, ApiError> {
    let encoded = state
        .client
        .query_workflow(&ids::researcher_workflow_id(&email), QUERY_RESEARCHER_TODOS)?;
    let todos =
        serde_json::from_value(encoded).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(todos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Engine, ManualClock};
    use crate::workflow::CaseTimeouts;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
        ));
        let engine = Arc::new(Engine::new(clock, CaseTimeouts::default()));
        let state = Arc::new(AppState {
            client: WorkflowClient::connect(engine),
        });
        api_router().with_state(state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn create_body() -> serde_json::Value {
        serde_json::json!({"email": "a@x", "tier": "standard", "package": "base"})
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let resp = test_router().oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_check_returns_created() {
        let resp = test_router()
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_check_rejects_malformed_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/checks")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_check_rejects_bad_email() {
        let resp = test_router()
            .oneshot(post_json(
                "/checks",
                serde_json::json!({"email": "not-an-email", "tier": "full", "package": "base"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let app = test_router();
        let resp = app
            .clone()
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = app
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn status_of_unknown_case_is_not_found() {
        let resp = test_router()
            .oneshot(get("/checks/nobody@x"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_of_unknown_case_is_not_found() {
        let resp = test_router()
            .oneshot(post_json("/checks/nobody@x/cancel", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn consent_with_unparseable_token_is_bad_request() {
        let resp = test_router()
            .oneshot(post_json(
                "/checks/not-base64!/consent",
                serde_json::json!({"consent": true}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn consent_with_unknown_token_is_gone() {
        let token = STANDARD.encode([0u8; 16]);
        let resp = test_router()
            .oneshot(post_json(
                &format!("/checks/{token}/consent"),
                serde_json::json!({"consent": true}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn report_before_completion_conflicts() {
        let app = test_router();
        app.clone()
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        let resp = app.oneshot(get("/checks/a@x/report")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn fresh_case_reports_pending_consent() {
        let app = test_router();
        app.clone()
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        let resp = app.oneshot(get("/checks/a@x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let status: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(status["state"], "pending_consent");
        assert_eq!(status["tier"], "standard");
        assert_eq!(status["email"], "a@x");
    }

    #[tokio::test]
    async fn candidate_todos_carry_a_consent_token() {
        let app = test_router();
        app.clone()
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        let resp = app.oneshot(get("/todos/candidate/a@x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let todos: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(todos.as_array().unwrap().len(), 1);
        assert_eq!(todos[0]["kind"], "consent");
        assert!(todos[0]["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn list_checks_shows_open_cases() {
        let app = test_router();
        let resp = app.clone().oneshot(get("/checks")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let checks: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(checks, serde_json::json!([]));

        app.clone()
            .oneshot(post_json("/checks", create_body()))
            .await
            .unwrap();
        let resp = app.oneshot(get("/checks")).await.unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let checks: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(checks[0]["email"], "a@x");
    }
}
