//! Recency tracking for the admin status projection.
//!
//! Records the last time a webhook arrived, agent data was ingested, a force
//! sync ran, and the aggregate changed. Readers take a copy.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// Point-in-time copy of the activity timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    pub last_webhook_at: Option<DateTime<Utc>>,
    pub last_agent_data_at: Option<DateTime<Utc>>,
    pub last_force_sync_at: Option<DateTime<Utc>>,
    pub last_aggregate_update_at: Option<DateTime<Utc>>,
}

impl ActivitySnapshot {
    /// Latest of the webhook, agent-data and force-sync times.
    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        [
            self.last_webhook_at,
            self.last_agent_data_at,
            self.last_force_sync_at,
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

#[derive(Debug, Default)]
pub struct ActivityTracker {
    inner: Mutex<ActivitySnapshot>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        *self.lock()
    }

    pub fn record_webhook(&self) {
        self.record_webhook_at(Utc::now());
    }

    pub fn record_agent_data(&self) {
        self.record_agent_data_at(Utc::now());
    }

    pub fn record_force_sync(&self) {
        self.record_force_sync_at(Utc::now());
    }

    pub fn record_aggregate_update(&self) {
        self.record_aggregate_update_at(Utc::now());
    }

    pub fn record_webhook_at(&self, at: DateTime<Utc>) {
        bump(&mut self.lock().last_webhook_at, at);
    }

    pub fn record_agent_data_at(&self, at: DateTime<Utc>) {
        bump(&mut self.lock().last_agent_data_at, at);
    }

    pub fn record_force_sync_at(&self, at: DateTime<Utc>) {
        bump(&mut self.lock().last_force_sync_at, at);
    }

    pub fn record_aggregate_update_at(&self, at: DateTime<Utc>) {
        bump(&mut self.lock().last_aggregate_update_at, at);
    }

    fn lock(&self) -> MutexGuard<'_, ActivitySnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timestamps only move forward.
fn bump(slot: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    if slot.is_none_or(|prev| at > prev) {
        *slot = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn empty_tracker_has_no_activity() {
        let tracker = ActivityTracker::new();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot, ActivitySnapshot::default());
        assert!(snapshot.last_activity_at().is_none());
    }

    #[test]
    fn last_activity_is_max_of_three_sources() {
        let tracker = ActivityTracker::new();
        let base = Utc::now();
        tracker.record_webhook_at(base);
        tracker.record_agent_data_at(base - Duration::seconds(5));
        tracker.record_force_sync_at(base + Duration::seconds(30));
        tracker.record_aggregate_update_at(base + Duration::seconds(60));

        assert_eq!(
            tracker.snapshot().last_activity_at(),
            Some(base + Duration::seconds(30))
        );
    }

    #[test]
    fn timestamps_never_move_backwards() {
        let tracker = ActivityTracker::new();
        let base = Utc::now();
        tracker.record_webhook_at(base);
        tracker.record_webhook_at(base - Duration::seconds(10));
        assert_eq!(tracker.snapshot().last_webhook_at, Some(base));
    }
}
