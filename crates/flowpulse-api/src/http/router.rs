//! Axum router configuration with middleware.
//!
//! The webhook and admin paths are derived from the configured source name,
//! e.g. `/api/webhooks/agent-workflow` and `/api/admin/agent/recent-status`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let source = state.config.webhook.source.clone();
    let webhook_path = state.config.webhook.webhook_path();

    let admin_routes = Router::new()
        .route("/recent-status", get(handlers::admin::recent_status))
        .route("/force-sync", post(handlers::admin::force_sync));

    Router::new()
        .route(&webhook_path, post(handlers::webhook::receive_webhook))
        .nest(&format!("/api/admin/{source}"), admin_routes)
        .route("/api/workflows", get(handlers::workflow::list_workflows))
        .route("/api/workflows/stream", get(handlers::workflow::stream_progress))
        .route("/api/workflows/{id}", get(handlers::workflow::get_workflow))
        .route("/health", get(handlers::health::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
