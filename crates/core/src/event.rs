//! Domain event system — decoupled observation of the task lifecycle.
//!
//! Events are published when something interesting happens in the queue or
//! the memory layer. Observers (CLI status output, operational alerting)
//! subscribe without coupling to the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A task was inserted into the queue
    TaskCreated {
        namespace: String,
        task_id: String,
        to_agent: String,
        timestamp: DateTime<Utc>,
    },

    /// A dispatcher won the claim race
    TaskClaimed {
        namespace: String,
        task_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A task reached a terminal status
    TaskFinished {
        namespace: String,
        task_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A memory record version was written
    RecordStored {
        namespace: String,
        file_path: String,
        version: i64,
        timestamp: DateTime<Utc>,
    },

    /// An artifact was embedded and indexed
    FileIndexed {
        namespace: String,
        file_path: String,
        collection: String,
        timestamp: DateTime<Utc>,
    },

    /// A human-approval gate was opened
    ApprovalRequested {
        namespace: String,
        approval_id: String,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// Operational alert: a finished task could not record its status.
    /// The queue is inconsistent until a human intervenes.
    QueueInconsistent {
        namespace: String,
        task_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Components
/// subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
