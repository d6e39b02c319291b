//! Application state shared across handlers.

use chrono::{DateTime, Utc};
use queue::QueueSender;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Queue for submitted ticks (absent when this process only ingests)
    pub queue: Option<Arc<dyn QueueSender>>,
    /// Process role, reported by `/health`
    pub role: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            queue: None,
            role: role.into(),
            started_at: Utc::now(),
        }
    }

    /// Enables `POST /ticks` by attaching a queue sender.
    pub fn with_queue(mut self, queue: Arc<dyn QueueSender>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
