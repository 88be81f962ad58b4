//! Envelope response format for API responses.
//!
//! Every response other than the webhook acknowledgement and the
//! recent-status poll is wrapped in a consistent envelope:
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 },
//!   "errors": [],
//!   "_links": { "self": "..." }
//! }
//! ```

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Envelope response wrapping all API data.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    pub meta: ApiMeta,

    /// Error list (empty on success).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,

    #[serde(rename = "_links", skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,
}

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ApiMeta {
    /// Unique request identifier for tracing.
    pub request_id: String,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
    pub response_time_ms: u64,
}

/// Individual error detail.
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
    /// Whether the sender should retry the same request.
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn meta(request_id: String, response_time_ms: u64) -> ApiMeta {
    ApiMeta {
        request_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
        response_time_ms,
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response with data.
    pub fn success(data: T, request_id: String, response_time_ms: u64) -> Self {
        Self {
            data: Some(data),
            meta: meta(request_id, response_time_ms),
            errors: Vec::new(),
            links: HashMap::new(),
        }
    }

    /// Add a HATEOAS link.
    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.insert(rel.to_string(), href.to_string());
        self
    }
}

impl ApiResponse<()> {
    /// Create an error response (no data).
    pub fn error(code: &str, message: &str, request_id: String, response_time_ms: u64) -> Self {
        Self {
            data: None,
            meta: meta(request_id, response_time_ms),
            errors: vec![ApiErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
                retryable: is_retryable(code),
                details: None,
            }],
            links: HashMap::new(),
        }
    }
}

/// HTTP status for a machine-readable error code.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "NOT_FOUND" | "WORKFLOW_NOT_FOUND" => StatusCode::NOT_FOUND,
        "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
        "VALIDATION_ERROR" | "MALFORMED_PAYLOAD" => StatusCode::BAD_REQUEST,
        "TIMEOUT" | "SERVICE_UNHEALTHY" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Server-side failures the sender may retry; client errors are terminal.
pub fn is_retryable(code: &str) -> bool {
    status_for_code(code).is_server_error()
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = match self.errors.first() {
            None => StatusCode::OK,
            Some(err) => status_for_code(&err.code),
        };

        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response","retryable":false}]}"#.to_string()
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let response = ApiResponse::success(serde_json::json!({"ok": true}), "req-1".to_string(), 3)
            .with_link("self", "/api/workflows");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["data"]["ok"], true);
        assert_eq!(value["meta"]["request_id"], "req-1");
        assert_eq!(value["meta"]["response_time_ms"], 3);
        assert_eq!(value["_links"]["self"], "/api/workflows");
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(status_for_code("WORKFLOW_NOT_FOUND"), StatusCode::NOT_FOUND);
        assert_eq!(status_for_code("UNAUTHORIZED"), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for_code("MALFORMED_PAYLOAD"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code("TIMEOUT"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for_code("STORAGE_FAILURE"), StatusCode::INTERNAL_SERVER_ERROR);

        assert!(is_retryable("TIMEOUT"));
        assert!(is_retryable("STORAGE_FAILURE"));
        assert!(!is_retryable("UNAUTHORIZED"));
        assert!(!is_retryable("MALFORMED_PAYLOAD"));
    }

    #[test]
    fn error_response_status() {
        let response = ApiResponse::error("UNAUTHORIZED", "nope", String::new(), 0).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
