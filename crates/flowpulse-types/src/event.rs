//! Workflow execution events received from the agent system.
//!
//! `WorkflowExecutionEvent` is a single notification as sent by the agent
//! system. `StoredEvent` is the same notification once it has been persisted,
//! carrying its position in the stream and the time it was received.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PayloadError;

/// Execution status reported by the agent system for a workflow or agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Triggered,
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    /// Rank used to keep per-agent status monotonic. Finished states share
    /// the highest rank so neither can overwrite the other.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Triggered => 0,
            Self::Running => 1,
            Self::Success | Self::Failed => 2,
        }
    }

    /// Returns true for `success` and `failed`.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Triggered => write!(f, "triggered"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triggered" => Ok(ExecutionStatus::Triggered),
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

/// One notification from the agent system.
///
/// Agent-level events carry an `agent_id`; workflow-level events do not.
/// Well-known optional fields are lifted out of the body, everything else
/// the sender includes stays in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionEvent {
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub execution_status: ExecutionStatus,
    #[serde(alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub occurred_at: DateTime<Utc>,
    /// Number of agents the workflow will run, when the sender declares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Opaque sender-owned data.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

/// Wire shape of a webhook body: known fields plus everything else flattened.
#[derive(Deserialize)]
struct WebhookBody {
    workflow_id: String,
    #[serde(default)]
    workflow_name: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    agent_name: Option<String>,
    execution_status: ExecutionStatus,
    #[serde(alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    occurred_at: DateTime<Utc>,
    #[serde(default)]
    agents_total: Option<u32>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowExecutionEvent {
    /// Parse a raw webhook body.
    ///
    /// The body must be a JSON object with at least `workflow_id`,
    /// `execution_status` and `occurred_at` (or `timestamp`). Blank
    /// identifiers are normalised: a blank `agent_id` means a workflow-level
    /// event, a blank `workflow_id` is rejected.
    pub fn from_webhook_body(body: &[u8]) -> Result<Self, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(PayloadError::NotAnObject);
        }

        let wire: WebhookBody =
            serde_json::from_value(value).map_err(|e| PayloadError::Invalid(e.to_string()))?;

        let workflow_id = wire.workflow_id.trim().to_string();
        if workflow_id.is_empty() {
            return Err(PayloadError::EmptyWorkflowId);
        }

        let payload = if wire.rest.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::Object(wire.rest)
        };

        Ok(Self {
            workflow_id,
            workflow_name: non_blank(wire.workflow_name),
            agent_id: non_blank(wire.agent_id),
            agent_name: non_blank(wire.agent_name),
            execution_status: wire.execution_status,
            occurred_at: wire.occurred_at,
            agents_total: wire.agents_total,
            error: non_blank(wire.error),
            payload,
        })
    }

    /// True when the event describes a single agent rather than the workflow.
    pub fn is_agent_event(&self) -> bool {
        self.agent_id.is_some()
    }

    /// Aggregation identity within one workflow stream.
    pub fn dedup_key(&self) -> (Option<String>, DateTime<Utc>) {
        (self.agent_id.clone(), self.occurred_at)
    }
}

/// A persisted event: its 1-based position in the stream plus receipt time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: WorkflowExecutionEvent,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accept RFC 3339 strings or integer unix seconds.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Seconds(i64),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{s}': {e}"))),
        RawTimestamp::Seconds(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agent_event_and_keeps_unknown_fields_in_payload() {
        let body = br#"{
            "workflow_id": "wf-1",
            "agent_id": "researcher",
            "execution_status": "success",
            "occurred_at": "2026-03-01T10:00:00Z",
            "tokens": 1200,
            "notes": {"source": "crawler"}
        }"#;

        let event = WorkflowExecutionEvent::from_webhook_body(body).unwrap();
        assert_eq!(event.workflow_id, "wf-1");
        assert_eq!(event.agent_id.as_deref(), Some("researcher"));
        assert_eq!(event.execution_status, ExecutionStatus::Success);
        assert_eq!(event.payload["tokens"], 1200);
        assert_eq!(event.payload["notes"]["source"], "crawler");
        assert!(event.is_agent_event());
    }

    #[test]
    fn accepts_unix_seconds_and_timestamp_alias() {
        let body = br#"{"workflow_id":"wf","execution_status":"triggered","timestamp":1767225600,"agents_total":4}"#;
        let event = WorkflowExecutionEvent::from_webhook_body(body).unwrap();
        assert_eq!(event.occurred_at.timestamp(), 1_767_225_600);
        assert_eq!(event.agents_total, Some(4));
        assert!(!event.is_agent_event());
        assert!(event.payload.is_null());
    }

    #[test]
    fn blank_agent_id_is_workflow_level() {
        let body = br#"{"workflow_id":"wf","agent_id":"  ","execution_status":"running","occurred_at":"2026-03-01T10:00:00Z"}"#;
        let event = WorkflowExecutionEvent::from_webhook_body(body).unwrap();
        assert!(event.agent_id.is_none());
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(
            WorkflowExecutionEvent::from_webhook_body(b"not json"),
            Err(PayloadError::InvalidJson(_))
        ));
        assert!(matches!(
            WorkflowExecutionEvent::from_webhook_body(b"[1,2,3]"),
            Err(PayloadError::NotAnObject)
        ));
        assert!(matches!(
            WorkflowExecutionEvent::from_webhook_body(
                br#"{"workflow_id":"wf","execution_status":"exploded","occurred_at":"2026-03-01T10:00:00Z"}"#
            ),
            Err(PayloadError::Invalid(_))
        ));
        assert!(matches!(
            WorkflowExecutionEvent::from_webhook_body(
                br#"{"workflow_id":" ","execution_status":"running","occurred_at":"2026-03-01T10:00:00Z"}"#
            ),
            Err(PayloadError::EmptyWorkflowId)
        ));
    }

    #[test]
    fn stored_event_flattens_event_fields() {
        let event = WorkflowExecutionEvent::from_webhook_body(
            br#"{"workflow_id":"wf","execution_status":"running","occurred_at":"2026-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        let stored = StoredEvent {
            sequence: 3,
            received_at: event.occurred_at,
            event,
        };

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["workflow_id"], "wf");
        assert_eq!(json["execution_status"], "running");
    }

    #[test]
    fn execution_status_from_str() {
        assert_eq!("SUCCESS".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Success);
        assert!("done".parse::<ExecutionStatus>().is_err());
        assert!(ExecutionStatus::Failed.is_finished());
        assert!(ExecutionStatus::Running.rank() > ExecutionStatus::Triggered.rank());
    }
}
