//! HTTP surface for the gateway.
//!
//! Thin axum handlers over [`Orchestrator`]. Every error body is
//! `{"error": "<message>"}`; storage failures are logged and reported as a
//! generic internal error.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::core::Orchestrator;
use crate::domain::{
    NewPatientRequest, NewPatientResponse, NewProvider, PendingRequests, Provider, RequestStatus,
    ResponseView,
};
use crate::error::{BrokerError, Entity, ErrorKind};

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Build the application router
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = AppState { orchestrator };

    let v1 = Router::new()
        .route("/provider", get(list_providers).post(register_provider))
        .route("/provider/:provider_id", get(get_provider))
        .route(
            "/fhir/patient/request",
            post(create_request).get(pending_requests),
        )
        .route("/fhir/patient/respond", post(receive_response))
        .route("/fhir/patient/response", get(get_response));

    Router::new()
        .route("/health", get(health))
        .nest("/v1", v1)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or missing query parameter
    BadRequest(String),
    Broker(BrokerError),
}

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self::BadRequest("invalid request body".to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Broker(e) => match e.kind() {
                ErrorKind::Invalid => (StatusCode::BAD_REQUEST, e.to_string()),
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                ErrorKind::Conflict => (StatusCode::CONFLICT, e.to_string()),
                ErrorKind::Internal => {
                    tracing::error!(error = %e, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthRes {
    ok: bool,
    message: String,
}

async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "gateway is alive".into(),
    })
}

async fn list_providers(State(state): State<AppState>) -> ApiResult<Json<Vec<Provider>>> {
    Ok(Json(state.orchestrator.list_providers().await?))
}

async fn register_provider(
    State(state): State<AppState>,
    body: Result<Json<NewProvider>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Provider>)> {
    let Json(input) = body?;
    let provider = state.orchestrator.register_provider(input).await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

async fn get_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> ApiResult<Json<Provider>> {
    Ok(Json(state.orchestrator.get_provider(&provider_id).await?))
}

/// Acknowledgement for a newly created request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRequest {
    request_id: String,
    status: RequestStatus,
    requestor_provider_id: String,
    target_provider_id: String,
    created_at: DateTime<Utc>,
}

async fn create_request(
    State(state): State<AppState>,
    body: Result<Json<NewPatientRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedRequest>)> {
    let Json(input) = body?;
    let request = state.orchestrator.create_request(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedRequest {
            request_id: request.request_id,
            status: request.status,
            requestor_provider_id: request.requestor_provider_id,
            target_provider_id: request.target_provider_id,
            created_at: request.created_at,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingQuery {
    target_provider_id: Option<String>,
}

async fn pending_requests(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<PendingRequests>> {
    let target = required(query.target_provider_id, "targetProviderId")?;

    match state.orchestrator.pending_requests_for_target(&target).await {
        Ok(pending) => Ok(Json(pending)),
        // Polling an unknown target is a lookup miss, not bad input
        Err(BrokerError::TargetNotFound(id)) => {
            Err(BrokerError::not_found(Entity::Provider, id).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Acknowledgement for a recorded response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedResponse {
    request_id: String,
    status: RequestStatus,
    received_at: DateTime<Utc>,
}

async fn receive_response(
    State(state): State<AppState>,
    body: Result<Json<NewPatientResponse>, JsonRejection>,
) -> ApiResult<Json<ReceivedResponse>> {
    let Json(input) = body?;
    let response = state.orchestrator.receive_response(input).await?;

    Ok(Json(ReceivedResponse {
        request_id: response.request_id,
        status: response.status,
        received_at: response.received_at,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseQuery {
    request_id: Option<String>,
}

async fn get_response(
    State(state): State<AppState>,
    Query(query): Query<ResponseQuery>,
) -> ApiResult<Json<ResponseView>> {
    let request_id = required(query.request_id, "requestId")?;
    Ok(Json(state.orchestrator.get_response(&request_id).await?))
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} query parameter is required", name)))
}
