//! Derived per-workflow progress model.
//!
//! `WorkflowProgress` is the aggregate the dashboards read. It is only ever
//! produced by folding stored events; nothing mutates it from the outside.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ExecutionStatus;

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Triggered,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// `completed` and `failed` are terminal.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        WorkflowStatus::Triggered
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Triggered => write!(f, "triggered"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triggered" => Ok(WorkflowStatus::Triggered),
            "running" => Ok(WorkflowStatus::Running),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            other => Err(format!("invalid workflow status: '{other}'")),
        }
    }
}

/// Latest known state of one agent within a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub status: ExecutionStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Aggregated progress of one workflow.
///
/// Counters are non-decreasing within a run. A new run attempt (see
/// `run_attempt`) starts from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    /// 1-based run attempt; bumped when a terminal workflow is re-triggered.
    pub run_attempt: u32,
    pub agents_total: u32,
    pub agents_completed: u32,
    pub agents_failed: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    /// Deduplicated events folded into the current run.
    pub events_applied: u64,
    /// Per-agent snapshots in order of first appearance.
    pub agents: Vec<AgentSnapshot>,
}

impl WorkflowProgress {
    /// Empty progress record for a workflow seen for the first time.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        let workflow_id = workflow_id.into();
        Self {
            workflow_name: workflow_id.clone(),
            workflow_id,
            status: WorkflowStatus::Triggered,
            run_attempt: 1,
            agents_total: 0,
            agents_completed: 0,
            agents_failed: 0,
            started_at: None,
            completed_at: None,
            last_event_at: None,
            events_applied: 0,
            agents: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Share of finished agents in `0.0..=100.0`. Zero when the total is unknown.
    pub fn percent_complete(&self) -> f32 {
        if self.agents_total == 0 {
            return 0.0;
        }
        let finished = (self.agents_completed + self.agents_failed).min(self.agents_total);
        finished as f32 * 100.0 / self.agents_total as f32
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }
}

/// Published by the aggregator each time a workflow aggregate changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub workflow_id: String,
    /// Status before this change; `None` for a newly seen workflow.
    pub previous_status: Option<WorkflowStatus>,
    pub progress: WorkflowProgress,
}

impl ProgressUpdate {
    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.progress.status)
    }
}
