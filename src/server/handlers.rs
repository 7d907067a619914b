/// API Request Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use super::AppState;
use crate::core::{DashboardState, MetricKind, MetricShape, PrometheusResponse, RawResults};
use crate::utils::constants::AGGREGATE_FAILURE_MESSAGE;

// ============================================================================
// Response Types
// ============================================================================

/// Error response with an `{"error": ...}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
pub struct QueryInfo {
    name: &'static str,
    title: &'static str,
    expression: &'static str,
    shape: MetricShape,
}

// ============================================================================
// Aggregation Handlers
// ============================================================================

/// Run the named query set; any upstream failure yields a generic 500
pub async fn get_prometheus(State(state): State<AppState>) -> Result<Json<RawResults>, ApiError> {
    match state.dispatcher.dispatch().await {
        Ok(results) => Ok(Json(results)),
        Err(e) => {
            error!(error = %e, "Error querying Prometheus");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                AGGREGATE_FAILURE_MESSAGE,
            ))
        }
    }
}

pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardState> {
    let current = state.dashboard.borrow().clone();
    Json(current)
}

pub async fn run_query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<PrometheusResponse>, ApiError> {
    let expression = params.query.trim();
    if expression.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "query parameter is required"));
    }

    state
        .dispatcher
        .client()
        .query(expression)
        .await
        .map(Json)
        .map_err(|e| {
            warn!(%expression, error = %e, "ad-hoc query failed");
            ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
        })
}

pub async fn get_queries() -> Json<Vec<QueryInfo>> {
    let queries = MetricKind::ALL
        .into_iter()
        .map(|kind| QueryInfo {
            name: kind.name(),
            title: kind.title(),
            expression: kind.expression(),
            shape: kind.shape(),
        })
        .collect();

    Json(queries)
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
