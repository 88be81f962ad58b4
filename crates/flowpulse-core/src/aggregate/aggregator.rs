//! Live per-workflow aggregates.
//!
//! `WorkflowAggregator` is the only writer of `WorkflowProgress`. Each ingest
//! appends to the store, re-folds the committed stream snapshot and swaps the
//! result into a `DashMap` cache. A write is accepted only when the stream
//! sequence it was folded from is at least the cached one, so a slow task
//! never overwrites newer state. Changes are broadcast on the `ProgressBus`.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use flowpulse_types::event::WorkflowExecutionEvent;
use flowpulse_types::progress::{ProgressUpdate, WorkflowProgress};
use tokio::sync::broadcast;

use super::AggregateError;
use super::fold::fold_events;
use crate::activity::ActivityTracker;
use crate::event::ProgressBus;
use crate::repository::EventStore;

#[derive(Debug, Clone)]
struct CachedProgress {
    source_sequence: u64,
    progress: WorkflowProgress,
}

pub struct WorkflowAggregator<S: EventStore> {
    store: Arc<S>,
    cache: DashMap<String, CachedProgress>,
    bus: ProgressBus,
    activity: Arc<ActivityTracker>,
}

impl<S: EventStore> WorkflowAggregator<S> {
    pub fn new(store: Arc<S>, bus: ProgressBus, activity: Arc<ActivityTracker>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            bus,
            activity,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn activity(&self) -> &Arc<ActivityTracker> {
        &self.activity
    }

    /// Persist one event and fold it into its workflow aggregate.
    ///
    /// Returns the aggregate as of this append. Nothing is cached or
    /// published when the append fails.
    pub async fn ingest(
        &self,
        event: WorkflowExecutionEvent,
    ) -> Result<WorkflowProgress, AggregateError> {
        let workflow_id = event.workflow_id.clone();
        let is_agent_event = event.is_agent_event();

        let receipt = self.store.append(&workflow_id, event).await?;
        if is_agent_event {
            self.activity.record_agent_data();
        }

        let progress = fold_events(&workflow_id, &receipt.events);
        tracing::debug!(
            workflow_id = %workflow_id,
            sequence = receipt.sequence,
            status = %progress.status,
            "event folded"
        );
        Ok(self.publish(&workflow_id, receipt.sequence, progress))
    }

    /// Re-fold every stream in the store. Returns the number of workflows
    /// aggregated.
    pub async fn rebuild(&self) -> Result<usize, AggregateError> {
        let streams = self.store.list_streams().await?;
        let mut rebuilt = 0;
        for workflow_id in streams {
            let events = self.store.load_all(&workflow_id).await;
            let Some(last) = events.last().map(|e| e.sequence) else {
                continue;
            };
            let progress = fold_events(&workflow_id, &events);
            self.publish(&workflow_id, last, progress);
            rebuilt += 1;
        }
        tracing::info!(workflows = rebuilt, "aggregates rebuilt from event store");
        Ok(rebuilt)
    }

    pub fn get(&self, workflow_id: &str) -> Option<WorkflowProgress> {
        self.cache.get(workflow_id).map(|c| c.progress.clone())
    }

    /// Clone of every cached aggregate, in no particular order.
    pub fn snapshot(&self) -> Vec<WorkflowProgress> {
        self.cache.iter().map(|c| c.progress.clone()).collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.bus.subscribe()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn publish(&self, workflow_id: &str, sequence: u64, progress: WorkflowProgress) -> WorkflowProgress {
        let update = match self.cache.entry(workflow_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let cached = entry.get();
                if cached.source_sequence > sequence {
                    tracing::debug!(
                        workflow_id,
                        sequence,
                        cached_sequence = cached.source_sequence,
                        "stale aggregate discarded"
                    );
                    return cached.progress.clone();
                }
                let previous_status = cached.progress.status;
                let changed = cached.progress != progress;
                entry.insert(CachedProgress {
                    source_sequence: sequence,
                    progress: progress.clone(),
                });
                changed.then(|| ProgressUpdate {
                    workflow_id: workflow_id.to_string(),
                    previous_status: Some(previous_status),
                    progress: progress.clone(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(CachedProgress {
                    source_sequence: sequence,
                    progress: progress.clone(),
                });
                Some(ProgressUpdate {
                    workflow_id: workflow_id.to_string(),
                    previous_status: None,
                    progress: progress.clone(),
                })
            }
        };

        if let Some(update) = update {
            if update.status_changed() {
                tracing::info!(
                    workflow_id,
                    from = ?update.previous_status,
                    to = %update.progress.status,
                    agents_completed = update.progress.agents_completed,
                    agents_failed = update.progress.agents_failed,
                    agents_total = update.progress.agents_total,
                    "workflow status changed"
                );
            }
            self.activity.record_aggregate_update();
            self.bus.publish(update);
        }
        progress
    }
}

impl<S: EventStore> std::fmt::Debug for WorkflowAggregator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowAggregator")
            .field("workflows", &self.cache.len())
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryEventStore;
    use chrono::{DateTime, TimeZone, Utc};
    use flowpulse_types::event::ExecutionStatus;
    use flowpulse_types::progress::WorkflowStatus;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn event(
        workflow_id: &str,
        agent_id: Option<&str>,
        status: ExecutionStatus,
        secs: i64,
        total: Option<u32>,
    ) -> WorkflowExecutionEvent {
        WorkflowExecutionEvent {
            workflow_id: workflow_id.to_string(),
            workflow_name: None,
            agent_id: agent_id.map(str::to_string),
            agent_name: None,
            execution_status: status,
            occurred_at: at(secs),
            agents_total: total,
            error: None,
            payload: serde_json::Value::Null,
        }
    }

    fn aggregator() -> WorkflowAggregator<InMemoryEventStore> {
        WorkflowAggregator::new(
            Arc::new(InMemoryEventStore::new()),
            ProgressBus::new(64),
            Arc::new(ActivityTracker::new()),
        )
    }

    #[tokio::test]
    async fn ingest_completes_workflow_w1() {
        let agg = aggregator();
        agg.ingest(event("W1", None, ExecutionStatus::Triggered, 0, Some(5)))
            .await
            .unwrap();
        for i in 0..5 {
            let agent = format!("agent-{i}");
            agg.ingest(event("W1", Some(&agent), ExecutionStatus::Success, 1 + i, None))
                .await
                .unwrap();
        }

        let progress = agg.get("W1").unwrap();
        assert_eq!(progress.status, WorkflowStatus::Completed);
        assert_eq!(progress.agents_completed, 5);
        assert_eq!(progress.agents_failed, 0);
        assert!(agg.activity().snapshot().last_agent_data_at.is_some());
    }

    #[tokio::test]
    async fn ingest_fails_workflow_w2() {
        let agg = aggregator();
        agg.ingest(event("W2", None, ExecutionStatus::Triggered, 0, Some(3)))
            .await
            .unwrap();
        agg.ingest(event("W2", Some("a"), ExecutionStatus::Success, 1, None))
            .await
            .unwrap();
        agg.ingest(event("W2", Some("b"), ExecutionStatus::Success, 2, None))
            .await
            .unwrap();
        let progress = agg
            .ingest(event("W2", Some("c"), ExecutionStatus::Failed, 3, None))
            .await
            .unwrap();

        assert_eq!(progress.status, WorkflowStatus::Failed);
        assert_eq!(progress.agents_failed, 1);
    }

    #[tokio::test]
    async fn duplicate_ingest_is_idempotent_and_silent() {
        let agg = aggregator();
        let mut rx = agg.subscribe();
        let trigger = event("wf", None, ExecutionStatus::Triggered, 0, Some(2));

        let first = agg.ingest(trigger.clone()).await.unwrap();
        let second = agg.ingest(trigger).await.unwrap();
        assert_eq!(first, second);

        let update = rx.recv().await.unwrap();
        assert!(update.previous_status.is_none());
        assert!(rx.try_recv().is_err());
        // Both copies are stored as history.
        assert_eq!(agg.store().load_all("wf").await.len(), 2);
    }

    #[tokio::test]
    async fn status_change_is_published_with_previous_status() {
        let agg = aggregator();
        let mut rx = agg.subscribe();
        agg.ingest(event("wf", None, ExecutionStatus::Triggered, 0, Some(1)))
            .await
            .unwrap();
        agg.ingest(event("wf", Some("a"), ExecutionStatus::Success, 1, None))
            .await
            .unwrap();

        let _created = rx.recv().await.unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.previous_status, Some(WorkflowStatus::Triggered));
        assert_eq!(update.progress.status, WorkflowStatus::Completed);
        assert!(update.status_changed());
    }

    #[tokio::test]
    async fn stale_fold_does_not_overwrite_newer_state() {
        let agg = aggregator();
        agg.ingest(event("wf", None, ExecutionStatus::Triggered, 0, Some(1)))
            .await
            .unwrap();
        agg.ingest(event("wf", Some("a"), ExecutionStatus::Success, 1, None))
            .await
            .unwrap();

        let stale = WorkflowProgress::new("wf");
        let kept = agg.publish("wf", 1, stale);
        assert_eq!(kept.status, WorkflowStatus::Completed);
        assert_eq!(agg.get("wf").unwrap().status, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn rebuild_hydrates_from_store() {
        let store = Arc::new(InMemoryEventStore::new());
        let first = WorkflowAggregator::new(
            Arc::clone(&store),
            ProgressBus::new(16),
            Arc::new(ActivityTracker::new()),
        );
        first
            .ingest(event("a", None, ExecutionStatus::Triggered, 0, Some(1)))
            .await
            .unwrap();
        first
            .ingest(event("b", Some("x"), ExecutionStatus::Running, 1, None))
            .await
            .unwrap();

        let fresh = WorkflowAggregator::new(
            store,
            ProgressBus::new(16),
            Arc::new(ActivityTracker::new()),
        );
        assert!(fresh.is_empty());
        assert_eq!(fresh.rebuild().await.unwrap(), 2);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.get("b").unwrap().status, WorkflowStatus::Running);
        assert_eq!(fresh.get("a"), first.get("a"));
    }

    #[tokio::test]
    async fn out_of_order_agent_success_before_trigger() {
        let agg = aggregator();
        agg.ingest(event("wf", Some("a"), ExecutionStatus::Success, 5, None))
            .await
            .unwrap();
        let progress = agg
            .ingest(event("wf", None, ExecutionStatus::Triggered, 0, Some(2)))
            .await
            .unwrap();
        assert_eq!(progress.status, WorkflowStatus::Running);
        assert_eq!(progress.agents_completed, 1);
        assert_eq!(progress.agents_total, 2);
    }
}
