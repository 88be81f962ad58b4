//! Application error type mapping domain errors to HTTP status codes and
//! envelope format.

use std::time::Duration;

use axum::response::{IntoResponse, Response};

use flowpulse_core::aggregate::AggregateError;
use flowpulse_infra::webhook::SignatureError;
use flowpulse_types::error::{PayloadError, StoreError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Webhook signature rejected. Never reaches storage.
    Unauthorized(SignatureError),
    /// Webhook body failed to parse. Never persisted.
    Payload(PayloadError),
    /// Event could not be persisted; the sender should retry.
    Storage(StoreError),
    NotFound(String),
    Validation(String),
    /// Ingest exceeded the configured request timeout.
    Timeout(Duration),
    Internal(String),
}

impl From<SignatureError> for AppError {
    fn from(e: SignatureError) -> Self {
        AppError::Unauthorized(e)
    }
}

impl From<PayloadError> for AppError {
    fn from(e: PayloadError) -> Self {
        AppError::Payload(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Storage(e)
    }
}

impl From<AggregateError> for AppError {
    fn from(e: AggregateError) -> Self {
        match e {
            AggregateError::Store(e) => AppError::Storage(e),
        }
    }
}

impl AppError {
    /// Machine-readable code and human-readable message.
    pub fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Unauthorized(e) => ("UNAUTHORIZED", e.to_string()),
            AppError::Payload(e) => ("MALFORMED_PAYLOAD", e.to_string()),
            AppError::Storage(e) => ("STORAGE_FAILURE", e.to_string()),
            AppError::NotFound(what) => ("WORKFLOW_NOT_FOUND", format!("{what} not found")),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
            AppError::Timeout(limit) => (
                "TIMEOUT",
                format!("request did not complete within {}s", limit.as_secs()),
            ),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = self.code_and_message();
        ApiResponse::error(code, &message, String::new(), 0).into_response()
    }
}
