//! Webhook receiver handler.
//!
//! Entry point for workflow execution events from the agent system:
//! verify the signature, parse the body, append to the event store, fold
//! into the aggregate, acknowledge. The whole pipeline runs under the
//! configured request timeout.
//!
//! Success is only acknowledged once the event has been persisted. Failures
//! use the envelope error format:
//! - bad, stale or missing signature: `401`
//! - body that is not a valid event: `400` (logged with the body digest)
//! - storage failure: `500`, timeout: `503` (both retryable)

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use flowpulse_infra::webhook::VerifyOutcome;
use flowpulse_types::event::WorkflowExecutionEvent;
use flowpulse_types::progress::{WorkflowProgress, WorkflowStatus};

use crate::http::error::AppError;
use crate::state::AppState;

/// Acknowledgement returned to the agent system.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub request_id: String,
    pub workflow_id: String,
    pub workflow_status: WorkflowStatus,
    /// False when accepted through the development bypass.
    pub verified: bool,
    pub response_time_ms: u64,
}

/// POST /api/webhooks/{source}-workflow - Receive a workflow execution event.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let signature = headers
        .get(state.verifier.header_name())
        .and_then(|v| v.to_str().ok());

    let limit = state.request_timeout();
    let (outcome, progress) = tokio::time::timeout(limit, ingest(&state, &body, signature))
        .await
        .map_err(|_| {
            tracing::warn!(%request_id, timeout_secs = limit.as_secs(), "webhook ingest timed out");
            AppError::Timeout(limit)
        })??;

    tracing::info!(
        %request_id,
        workflow_id = %progress.workflow_id,
        status = %progress.status,
        "webhook accepted"
    );

    Ok(Json(WebhookAck {
        received: true,
        request_id,
        workflow_id: progress.workflow_id,
        workflow_status: progress.status,
        verified: outcome == VerifyOutcome::Verified,
        response_time_ms: start.elapsed().as_millis() as u64,
    }))
}

async fn ingest(
    state: &AppState,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(VerifyOutcome, WorkflowProgress), AppError> {
    let outcome = state.verifier.verify_request(body, signature)?;
    state.aggregator.activity().record_webhook();

    let event = WorkflowExecutionEvent::from_webhook_body(body).map_err(|e| {
        tracing::warn!(
            body_sha256 = %body_digest(body),
            body_len = body.len(),
            error = %e,
            "malformed webhook payload"
        );
        AppError::from(e)
    })?;

    let progress = state.aggregator.ingest(event).await.map_err(|e| {
        tracing::error!(error = %e, "failed to persist webhook event");
        AppError::from(e)
    })?;

    Ok((outcome, progress))
}

/// Hex SHA-256 of the raw body, logged instead of the body itself.
fn body_digest(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_digest_is_hex_sha256() {
        assert_eq!(
            body_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
