//! Event store trait definition.
//!
//! Defines the durable, append-only storage interface for workflow event
//! streams. The infrastructure layer (flowpulse-infra) implements this trait
//! with one JSON file per stream.

use flowpulse_types::error::StoreError;
use flowpulse_types::event::{StoredEvent, WorkflowExecutionEvent};

/// Result of a successful append.
///
/// `events` is the full stream as committed, captured while the stream lock
/// was held, so callers can fold exactly the state they appended to.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    /// Sequence assigned to the appended event.
    pub sequence: u64,
    pub events: Vec<StoredEvent>,
}

/// Append-only store of raw workflow events, one stream per workflow.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait EventStore: Send + Sync {
    /// Append an event to the workflow's stream, creating it if needed.
    ///
    /// Appends to the same stream are serialized; an `Ok` means the event is
    /// durable.
    fn append(
        &self,
        workflow_id: &str,
        event: WorkflowExecutionEvent,
    ) -> impl std::future::Future<Output = Result<AppendReceipt, StoreError>> + Send;

    /// Load every event of a stream in append order.
    ///
    /// Never fails: a missing stream is empty, and unreadable or corrupt
    /// content is logged and treated as empty.
    fn load_all(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Vec<StoredEvent>> + Send;

    /// Workflow ids of every stream in the store.
    fn list_streams(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Check the store is reachable and writable.
    fn health_check(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
