//! Broadcast bus for distributing `ProgressUpdate`s to live subscribers.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active subscribers
//! is a no-op, and a slow subscriber lags instead of blocking ingestion.

use flowpulse_types::progress::ProgressUpdate;
use tokio::sync::broadcast;

/// Default channel capacity used by the service.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Multi-consumer bus for workflow progress changes.
///
/// Cloning the bus clones the sender, so every clone publishes into the
/// same channel.
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl ProgressBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a subscriber that will receive all future updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Publish an update to all current subscribers.
    pub fn publish(&self, update: ProgressUpdate) {
        let _ = self.sender.send(update);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Clone for ProgressBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
