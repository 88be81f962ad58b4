//! Admin endpoints polled by the dashboards.
//!
//! `recent-status` returns the bare `RecentActivityStatus` (dashboards poll
//! it directly); `force-sync` uses the envelope.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use uuid::Uuid;

use flowpulse_types::status::RecentActivityStatus;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ForceSyncResult {
    pub workflows: usize,
}

/// GET /api/admin/{source}/recent-status - Recency summary.
pub async fn recent_status(State(state): State<AppState>) -> Json<RecentActivityStatus> {
    Json(state.status_service.get_recent_activity())
}

/// POST /api/admin/{source}/force-sync - Re-aggregate every stream.
pub async fn force_sync(
    State(state): State<AppState>,
) -> Result<ApiResponse<ForceSyncResult>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflows = state.status_service.force_sync().await?;
    tracing::info!(%request_id, workflows, "force sync completed");

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(ForceSyncResult { workflows }, request_id, elapsed))
}
