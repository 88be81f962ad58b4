//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// Query parameters for the workflow list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct WorkflowListQuery {
    /// Maximum results; clamped by the status service.
    pub limit: Option<usize>,
}
