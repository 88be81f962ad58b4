//! Health report endpoint.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use flowpulse_types::status::HealthStatus;

use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /health - Component health report; `503` when unhealthy.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let report = state.status_service.perform_health_check().await;
    let status = match report.overall {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    let elapsed = start.elapsed().as_millis() as u64;
    (status, ApiResponse::success(report, request_id, elapsed)).into_response()
}
