//! In-memory event store.
//!
//! Non-durable `EventStore` for embedding and tests. A single mutex guards
//! all streams, which trivially serializes appends per stream.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use flowpulse_types::error::StoreError;
use flowpulse_types::event::{StoredEvent, WorkflowExecutionEvent};

use super::event_store::{AppendReceipt, EventStore};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: Mutex<BTreeMap<String, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events across all streams.
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<StoredEvent>>> {
        self.streams
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        workflow_id: &str,
        event: WorkflowExecutionEvent,
    ) -> Result<AppendReceipt, StoreError> {
        let mut streams = self.lock();
        let stream = streams.entry(workflow_id.to_string()).or_default();
        let sequence = stream.len() as u64 + 1;
        stream.push(StoredEvent {
            sequence,
            received_at: Utc::now(),
            event,
        });
        Ok(AppendReceipt {
            sequence,
            events: stream.clone(),
        })
    }

    async fn load_all(&self, workflow_id: &str) -> Vec<StoredEvent> {
        self.lock().get(workflow_id).cloned().unwrap_or_default()
    }

    async fn list_streams(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().keys().cloned().collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
