//! HTTP/REST layer for flowpulse.
//!
//! Axum-based service: the webhook receiver, admin endpoints for the
//! dashboards, workflow queries and the health report.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
