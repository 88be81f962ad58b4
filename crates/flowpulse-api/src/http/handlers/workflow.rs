//! Workflow progress queries and the live progress stream.
//!
//! SSE event types on `/api/workflows/stream`:
//! - `progress`: a `ProgressUpdate` for every aggregate change
//! - `lagged`: the subscriber fell behind: `{ "skipped": N }`

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::Stream;
use uuid::Uuid;

use flowpulse_types::progress::WorkflowProgress;

use crate::http::error::AppError;
use crate::http::extractors::query::WorkflowListQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/workflows - Most recently started workflows.
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<WorkflowListQuery>,
) -> ApiResponse<Vec<WorkflowProgress>> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflows = state.status_service.list_recent(query.limit);

    let elapsed = start.elapsed().as_millis() as u64;
    ApiResponse::success(workflows, request_id, elapsed).with_link("self", "/api/workflows")
}

/// GET /api/workflows/{id} - Aggregated progress of one workflow.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<ApiResponse<WorkflowProgress>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let progress = state
        .status_service
        .get_workflow(&workflow_id)
        .ok_or_else(|| AppError::NotFound(format!("workflow '{workflow_id}'")))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(progress, request_id, elapsed)
        .with_link("self", &format!("/api/workflows/{workflow_id}"))
        .with_link("stream", "/api/workflows/stream"))
}

/// GET /api/workflows/stream - Server-sent progress updates.
pub async fn stream_progress(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut updates = state.aggregator.subscribe();

    let sse_stream = async_stream::stream! {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    match serde_json::to_string(&update) {
                        Ok(data) => yield Ok::<_, Infallible>(Event::default().event("progress").data(data)),
                        Err(e) => tracing::warn!(error = %e, "failed to serialize progress update"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress subscriber lagged");
                    let data = serde_json::json!({ "skipped": skipped });
                    yield Ok(Event::default().event("lagged").data(data.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
