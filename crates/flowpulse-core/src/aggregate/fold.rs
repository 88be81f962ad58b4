//! Pure fold of a stored event stream into a `WorkflowProgress`.
//!
//! The fold walks events in stream order and derives every counter from the
//! per-agent snapshots, never by incrementing on receipt. Key properties:
//! - Duplicate deliveries (same `(agent_id, occurred_at)`) are no-ops
//! - Agent status is monotonic by rank; a finished agent never changes
//! - A terminal workflow status never regresses, except through an explicit
//!   re-trigger that occurred after the run ended

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use flowpulse_types::event::{ExecutionStatus, StoredEvent, WorkflowExecutionEvent};
use flowpulse_types::progress::{AgentSnapshot, WorkflowProgress, WorkflowStatus};

type DedupKey = (Option<String>, DateTime<Utc>);

/// Incremental fold state for one workflow stream.
#[derive(Debug, Clone)]
pub struct WorkflowFold {
    progress: WorkflowProgress,
    /// Status of the first event kept for each dedup key.
    seen: HashMap<DedupKey, ExecutionStatus>,
    /// Set once the sender declared a total or finalised the run.
    total_known: bool,
    /// Trigger time of the current run when it was started by a re-trigger.
    run_started_at: Option<DateTime<Utc>>,
}

impl WorkflowFold {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            progress: WorkflowProgress::new(workflow_id),
            seen: HashMap::new(),
            total_known: false,
            run_started_at: None,
        }
    }

    pub fn progress(&self) -> &WorkflowProgress {
        &self.progress
    }

    pub fn into_progress(self) -> WorkflowProgress {
        self.progress
    }

    /// Fold one stored event. Returns `false` when it was ignored.
    pub fn apply(&mut self, stored: &StoredEvent) -> bool {
        let event = &stored.event;
        match self.seen.entry(event.dedup_key()) {
            Entry::Occupied(kept) => {
                if *kept.get() != event.execution_status {
                    tracing::debug!(
                        workflow_id = %self.progress.workflow_id,
                        agent_id = event.agent_id.as_deref().unwrap_or("-"),
                        kept = ?kept.get(),
                        dropped = ?event.execution_status,
                        "event shares a dedup key with an earlier one, keeping the first"
                    );
                }
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(event.execution_status);
            }
        }

        if self.is_retrigger(event) {
            self.start_new_run(event.occurred_at);
        } else if self
            .run_started_at
            .is_some_and(|started| event.occurred_at < started)
        {
            // Belongs to a previous run.
            return false;
        }

        self.record_common(event);

        if event.is_agent_event() {
            self.apply_agent(event);
        } else {
            self.apply_workflow(event);
        }

        self.recount();
        self.evaluate(event.occurred_at);
        true
    }

    fn is_retrigger(&self, event: &WorkflowExecutionEvent) -> bool {
        !event.is_agent_event()
            && event.execution_status == ExecutionStatus::Triggered
            && self.progress.is_terminal()
            && self
                .progress
                .completed_at
                .is_some_and(|ended| event.occurred_at > ended)
    }

    fn start_new_run(&mut self, triggered_at: DateTime<Utc>) {
        let mut next = WorkflowProgress::new(self.progress.workflow_id.clone());
        next.workflow_name = self.progress.workflow_name.clone();
        next.run_attempt = self.progress.run_attempt + 1;
        self.progress = next;
        self.total_known = false;
        self.run_started_at = Some(triggered_at);
    }

    fn record_common(&mut self, event: &WorkflowExecutionEvent) {
        let progress = &mut self.progress;
        progress.events_applied += 1;

        if let Some(name) = &event.workflow_name {
            progress.workflow_name = name.clone();
        }

        let at = event.occurred_at;
        progress.last_event_at = Some(progress.last_event_at.map_or(at, |prev| prev.max(at)));
        progress.started_at = Some(progress.started_at.map_or(at, |prev| prev.min(at)));

        if let Some(declared) = event.agents_total.filter(|n| *n > 0) {
            progress.agents_total = progress.agents_total.max(declared);
            self.total_known = true;
        }
    }

    fn apply_agent(&mut self, event: &WorkflowExecutionEvent) {
        let Some(agent_id) = event.agent_id.as_deref() else {
            return;
        };
        let at = event.occurred_at;
        let status = event.execution_status;

        let agents = &mut self.progress.agents;
        let index = match agents.iter().position(|a| a.agent_id == agent_id) {
            Some(index) => index,
            None => {
                agents.push(AgentSnapshot {
                    agent_id: agent_id.to_string(),
                    agent_name: None,
                    status: ExecutionStatus::Triggered,
                    first_seen_at: at,
                    last_event_at: at,
                    finished_at: None,
                    last_error: None,
                });
                agents.len() - 1
            }
        };

        let agent = &mut agents[index];
        agent.first_seen_at = agent.first_seen_at.min(at);
        agent.last_event_at = agent.last_event_at.max(at);
        if let Some(name) = &event.agent_name {
            agent.agent_name = Some(name.clone());
        }

        if !agent.status.is_finished() && status.rank() >= agent.status.rank() {
            agent.status = status;
            if status.is_finished() {
                agent.finished_at = Some(at);
            }
            if status == ExecutionStatus::Failed {
                agent.last_error = event.error.clone();
            }
        }

        if self.progress.status == WorkflowStatus::Triggered {
            self.progress.status = WorkflowStatus::Running;
        }
    }

    fn apply_workflow(&mut self, event: &WorkflowExecutionEvent) {
        let progress = &mut self.progress;
        match event.execution_status {
            ExecutionStatus::Triggered => {}
            ExecutionStatus::Running => {
                if progress.status == WorkflowStatus::Triggered {
                    progress.status = WorkflowStatus::Running;
                }
            }
            ExecutionStatus::Success => {
                self.total_known = true;
                if progress.agents.is_empty() && !progress.is_terminal() {
                    progress.status = WorkflowStatus::Completed;
                    progress.completed_at = Some(event.occurred_at);
                }
            }
            ExecutionStatus::Failed => {
                if !progress.is_terminal() {
                    progress.status = WorkflowStatus::Failed;
                    progress.completed_at = Some(event.occurred_at);
                }
            }
        }
    }

    fn recount(&mut self) {
        let progress = &mut self.progress;
        let mut completed = 0;
        let mut failed = 0;
        for agent in &progress.agents {
            match agent.status {
                ExecutionStatus::Success => completed += 1,
                ExecutionStatus::Failed => failed += 1,
                _ => {}
            }
        }
        progress.agents_completed = completed;
        progress.agents_failed = failed;
        progress.agents_total = progress.agents_total.max(progress.agents.len() as u32);
    }

    fn evaluate(&mut self, at: DateTime<Utc>) {
        let progress = &mut self.progress;
        if progress.is_terminal() {
            return;
        }

        if progress.agents_failed > 0 {
            progress.status = WorkflowStatus::Failed;
            progress.completed_at = Some(at);
        } else if self.total_known
            && progress.agents_total > 0
            && progress.agents_completed + progress.agents_failed == progress.agents_total
        {
            progress.status = WorkflowStatus::Completed;
            progress.completed_at = Some(at);
        }
    }
}

/// Fold a full stream into its aggregate.
pub fn fold_events(workflow_id: &str, events: &[StoredEvent]) -> WorkflowProgress {
    let mut fold = WorkflowFold::new(workflow_id);
    for stored in events {
        fold.apply(stored);
    }
    fold.into_progress()
}
