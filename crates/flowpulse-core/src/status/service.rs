//! Status query service.
//!
//! Read-only view over the aggregator cache plus the activity tracker. The
//! only write it triggers is `force_sync`, which delegates to the aggregator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowpulse_types::progress::WorkflowProgress;
use flowpulse_types::status::{
    ActivityStatus, ComponentHealth, HealthReport, RecentActivityStatus,
};
use futures_util::future::join_all;

use crate::aggregate::{AggregateError, WorkflowAggregator};
use crate::health::BoxHealthProbe;
use crate::repository::EventStore;

pub const DEFAULT_LIST_LIMIT: usize = 10;
pub const MAX_LIST_LIMIT: usize = 100;

pub struct StatusQueryService<S: EventStore> {
    aggregator: Arc<WorkflowAggregator<S>>,
    probes: Vec<BoxHealthProbe>,
    stale_after: Duration,
}

impl<S: EventStore> StatusQueryService<S> {
    pub fn new(aggregator: Arc<WorkflowAggregator<S>>, stale_after: Duration) -> Self {
        Self {
            aggregator,
            probes: Vec::new(),
            stale_after,
        }
    }

    /// Add a non-critical dependency probe to the health report.
    pub fn with_probe(mut self, probe: BoxHealthProbe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn aggregator(&self) -> &Arc<WorkflowAggregator<S>> {
        &self.aggregator
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<WorkflowProgress> {
        self.aggregator.get(workflow_id)
    }

    /// Most recently started workflows first. Records that never started
    /// sort last. `limit` is clamped to `1..=100`; `None` means 10.
    pub fn list_recent(&self, limit: Option<usize>) -> Vec<WorkflowProgress> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let mut all = self.aggregator.snapshot();
        all.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.workflow_id.cmp(&b.workflow_id))
        });
        all.truncate(limit);
        all
    }

    pub fn get_recent_activity(&self) -> RecentActivityStatus {
        let activity = self.aggregator.activity().snapshot();
        let latest = self.list_recent(Some(1)).into_iter().next();

        let Some(latest) = latest else {
            return RecentActivityStatus {
                status: ActivityStatus::None,
                last_activity_at: None,
                last_webhook_at: None,
                last_agent_data_at: None,
                last_force_sync_at: None,
                workflow_id: None,
                workflow_name: None,
                message: "No workflow activity recorded yet. Run a force sync if events \
                          were expected."
                    .to_string(),
            };
        };

        let status = ActivityStatus::from(latest.status);
        let message = match status {
            ActivityStatus::Processing => format!(
                "Workflow '{}' is processing ({}/{} agents finished).",
                latest.workflow_name,
                latest.agents_completed + latest.agents_failed,
                latest.agents_total
            ),
            ActivityStatus::Success => format!(
                "Workflow '{}' completed successfully.",
                latest.workflow_name
            ),
            ActivityStatus::Failed => format!(
                "Workflow '{}' failed: {} of {} agents failed. Check the agent system, \
                 then force sync.",
                latest.workflow_name, latest.agents_failed, latest.agents_total
            ),
            ActivityStatus::None => String::new(),
        };

        RecentActivityStatus {
            status,
            last_activity_at: activity.last_activity_at(),
            last_webhook_at: activity.last_webhook_at,
            last_agent_data_at: activity.last_agent_data_at,
            last_force_sync_at: activity.last_force_sync_at,
            workflow_id: Some(latest.workflow_id),
            workflow_name: Some(latest.workflow_name),
            message,
        }
    }

    pub async fn perform_health_check(&self) -> HealthReport {
        let mut components = BTreeMap::new();

        let store = match self.aggregator.store().health_check().await {
            Ok(()) => ComponentHealth::healthy(true, "reachable and writable"),
            Err(e) => {
                tracing::warn!(error = %e, "event store health check failed");
                ComponentHealth::unhealthy(true, e.to_string())
            }
        };
        components.insert("event_store".to_string(), store);
        components.insert("aggregator".to_string(), self.aggregator_health());

        let results = join_all(self.probes.iter().map(|p| async move {
            (p.name().to_string(), p.check().await)
        }))
        .await;
        components.extend(results);

        HealthReport::from_components(components)
    }

    /// Record a force sync and re-fold every stream.
    pub async fn force_sync(&self) -> Result<usize, AggregateError> {
        self.aggregator.activity().record_force_sync();
        self.aggregator.rebuild().await
    }

    fn aggregator_health(&self) -> ComponentHealth {
        let workflows = self.aggregator.len();
        let Some(updated) = self.aggregator.activity().snapshot().last_aggregate_update_at else {
            return ComponentHealth::healthy(false, format!("{workflows} workflows, no updates yet"));
        };

        let age = (Utc::now() - updated).to_std().unwrap_or_default();
        if age > self.stale_after {
            ComponentHealth::degraded(
                false,
                format!("last update {}s ago, {workflows} workflows", age.as_secs()),
            )
        } else {
            ComponentHealth::healthy(
                false,
                format!("last update {}s ago, {workflows} workflows", age.as_secs()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityTracker;
    use crate::event::ProgressBus;
    use crate::health::HealthProbe;
    use crate::repository::memory::InMemoryEventStore;
    use crate::repository::AppendReceipt;
    use chrono::{DateTime, TimeZone};
    use flowpulse_types::error::StoreError;
    use flowpulse_types::event::{ExecutionStatus, StoredEvent, WorkflowExecutionEvent};
    use flowpulse_types::progress::WorkflowStatus;
    use flowpulse_types::status::HealthStatus;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn event(workflow_id: &str, agent_id: Option<&str>, status: ExecutionStatus, secs: i64) -> WorkflowExecutionEvent {
        WorkflowExecutionEvent {
            workflow_id: workflow_id.to_string(),
            workflow_name: None,
            agent_id: agent_id.map(str::to_string),
            agent_name: None,
            execution_status: status,
            occurred_at: at(secs),
            agents_total: None,
            error: None,
            payload: serde_json::Value::Null,
        }
    }

    fn service_over<S: EventStore>(store: S) -> StatusQueryService<S> {
        let aggregator = WorkflowAggregator::new(
            Arc::new(store),
            ProgressBus::new(16),
            Arc::new(ActivityTracker::new()),
        );
        StatusQueryService::new(Arc::new(aggregator), Duration::from_secs(3600))
    }

    fn service() -> StatusQueryService<InMemoryEventStore> {
        service_over(InMemoryEventStore::new())
    }

    struct BrokenStore;

    impl EventStore for BrokenStore {
        async fn append(
            &self,
            workflow_id: &str,
            _event: WorkflowExecutionEvent,
        ) -> Result<AppendReceipt, StoreError> {
            Err(StoreError::WriteFailure {
                stream: workflow_id.to_string(),
                message: "read-only".to_string(),
            })
        }

        async fn load_all(&self, _workflow_id: &str) -> Vec<StoredEvent> {
            Vec::new()
        }

        async fn list_streams(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("mount missing".to_string()))
        }
    }

    struct DownProbe;

    impl HealthProbe for DownProbe {
        fn name(&self) -> &str {
            "crm"
        }

        async fn check(&self) -> ComponentHealth {
            ComponentHealth::unhealthy(false, "connection refused")
        }
    }

    #[test]
    fn recent_activity_without_workflows_is_none() {
        let status = service().get_recent_activity();
        assert_eq!(status.status, ActivityStatus::None);
        assert!(status.last_activity_at.is_none());
        assert!(status.last_webhook_at.is_none());
        assert!(status.last_agent_data_at.is_none());
        assert!(status.last_force_sync_at.is_none());
        assert!(status.workflow_id.is_none());
        assert!(!status.message.is_empty());
    }

    #[tokio::test]
    async fn recent_activity_reflects_latest_workflow() {
        let svc = service();
        let agg = svc.aggregator();
        agg.ingest(event("old", Some("a"), ExecutionStatus::Failed, 0))
            .await
            .unwrap();
        agg.ingest(event("new", Some("a"), ExecutionStatus::Running, 100))
            .await
            .unwrap();

        let status = svc.get_recent_activity();
        assert_eq!(status.status, ActivityStatus::Processing);
        assert_eq!(status.workflow_id.as_deref(), Some("new"));
        assert!(status.last_agent_data_at.is_some());
        assert_eq!(status.last_activity_at, status.last_agent_data_at);
    }

    #[tokio::test]
    async fn list_recent_orders_by_start_and_clamps_limit() {
        let svc = service();
        for (id, secs) in [("a", 10), ("b", 30), ("c", 20)] {
            svc.aggregator()
                .ingest(event(id, None, ExecutionStatus::Triggered, secs))
                .await
                .unwrap();
        }

        let ids: Vec<_> = svc
            .list_recent(None)
            .into_iter()
            .map(|p| p.workflow_id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(svc.list_recent(Some(0)).len(), 1);
        assert_eq!(svc.list_recent(Some(500)).len(), 3);
    }

    #[tokio::test]
    async fn get_workflow_returns_none_for_unknown() {
        let svc = service();
        assert!(svc.get_workflow("nope").is_none());
        svc.aggregator()
            .ingest(event("wf", None, ExecutionStatus::Running, 0))
            .await
            .unwrap();
        assert_eq!(svc.get_workflow("wf").unwrap().status, WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn health_is_healthy_with_working_store() {
        let report = service().perform_health_check().await;
        assert_eq!(report.overall, HealthStatus::Healthy);
        assert!(report.components["event_store"].critical);
        assert!(report.components.contains_key("aggregator"));
    }

    #[tokio::test]
    async fn failing_dependency_degrades() {
        let svc = service().with_probe(BoxHealthProbe::new(DownProbe));
        let report = svc.perform_health_check().await;
        assert_eq!(report.overall, HealthStatus::Degraded);
        assert_eq!(report.components["crm"].status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn unreachable_store_is_unhealthy() {
        let report = service_over(BrokenStore).perform_health_check().await;
        assert_eq!(report.overall, HealthStatus::Unhealthy);
        assert_eq!(report.components["event_store"].status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn stale_aggregator_degrades() {
        let svc = service();
        svc.aggregator()
            .activity()
            .record_aggregate_update_at(Utc::now() - chrono::Duration::hours(2));
        let report = svc.perform_health_check().await;
        assert_eq!(report.components["aggregator"].status, HealthStatus::Degraded);
        assert_eq!(report.overall, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn force_sync_records_time_and_rebuilds() {
        let store = InMemoryEventStore::new();
        store
            .append("wf", event("wf", None, ExecutionStatus::Triggered, 0))
            .await
            .unwrap();
        let svc = service_over(store);
        assert!(svc.get_workflow("wf").is_none());

        assert_eq!(svc.force_sync().await.unwrap(), 1);
        assert!(svc.get_workflow("wf").is_some());
        let status = svc.get_recent_activity();
        assert!(status.last_force_sync_at.is_some());
        assert_eq!(status.last_activity_at, status.last_force_sync_at);
    }

    #[tokio::test]
    async fn write_failure_leaves_no_aggregate() {
        let svc = service_over(BrokenStore);
        let result = svc
            .aggregator()
            .ingest(event("wf", None, ExecutionStatus::Triggered, 0))
            .await;
        assert!(matches!(result, Err(AggregateError::Store(_))));
        assert!(svc.get_workflow("wf").is_none());
    }
}
