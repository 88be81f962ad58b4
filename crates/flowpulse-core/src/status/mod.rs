//! Read path over the aggregates: queries, recency and health.

pub mod service;

pub use service::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, StatusQueryService};
