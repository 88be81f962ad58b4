//! Read-side projections: recent activity and health reports.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::WorkflowStatus;

/// Display status for the recent-activity widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    None,
    Processing,
    Success,
    Failed,
}

impl From<WorkflowStatus> for ActivityStatus {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Triggered | WorkflowStatus::Running => ActivityStatus::Processing,
            WorkflowStatus::Completed => ActivityStatus::Success,
            WorkflowStatus::Failed => ActivityStatus::Failed,
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityStatus::None => write!(f, "none"),
            ActivityStatus::Processing => write!(f, "processing"),
            ActivityStatus::Success => write!(f, "success"),
            ActivityStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Recency summary polled by dashboards. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivityStatus {
    pub status: ActivityStatus,
    /// Latest of the three activity timestamps below.
    pub last_activity_at: Option<DateTime<Utc>>,
    pub last_webhook_at: Option<DateTime<Utc>>,
    pub last_agent_data_at: Option<DateTime<Utc>>,
    pub last_force_sync_at: Option<DateTime<Utc>>,
    pub workflow_id: Option<String>,
    pub workflow_name: Option<String>,
    /// Human-readable explanation for operators.
    pub message: String,
}

/// Health of one component or of the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    /// A critical component that is not healthy makes the service unhealthy.
    pub critical: bool,
    pub details: String,
}

impl ComponentHealth {
    pub fn healthy(critical: bool, details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            critical,
            details: details.into(),
        }
    }

    pub fn degraded(critical: bool, details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            critical,
            details: details.into(),
        }
    }

    pub fn unhealthy(critical: bool, details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            critical,
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthReport {
    /// Build a report, deriving `overall` from the components:
    /// - a critical component that is unhealthy makes the service unhealthy
    /// - any other impairment makes it degraded
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let overall = components
            .values()
            .map(|c| match (c.status, c.critical) {
                (HealthStatus::Unhealthy, true) => HealthStatus::Unhealthy,
                (HealthStatus::Healthy, _) => HealthStatus::Healthy,
                _ => HealthStatus::Degraded,
            })
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            overall,
            checked_at: Utc::now(),
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_status_from_workflow_status() {
        assert_eq!(ActivityStatus::from(WorkflowStatus::Triggered), ActivityStatus::Processing);
        assert_eq!(ActivityStatus::from(WorkflowStatus::Running), ActivityStatus::Processing);
        assert_eq!(ActivityStatus::from(WorkflowStatus::Completed), ActivityStatus::Success);
        assert_eq!(ActivityStatus::from(WorkflowStatus::Failed), ActivityStatus::Failed);
    }

    #[test]
    fn overall_is_unhealthy_only_for_critical_failures() {
        let mut components = BTreeMap::new();
        components.insert("event_store".to_string(), ComponentHealth::healthy(true, "ok"));
        components.insert("crm".to_string(), ComponentHealth::unhealthy(false, "timeout"));
        assert_eq!(HealthReport::from_components(components.clone()).overall, HealthStatus::Degraded);

        components.insert("event_store".to_string(), ComponentHealth::unhealthy(true, "gone"));
        assert_eq!(HealthReport::from_components(components).overall, HealthStatus::Unhealthy);
    }

    #[test]
    fn empty_report_is_healthy() {
        let report = HealthReport::from_components(BTreeMap::new());
        assert_eq!(report.overall, HealthStatus::Healthy);
    }

    #[test]
    fn health_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded).unwrap(), "\"degraded\"");
        assert_eq!(serde_json::to_string(&ActivityStatus::None).unwrap(), "\"none\"");
    }
}
