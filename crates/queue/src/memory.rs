//! In-process queue with visibility timeouts and dead-lettering.
//!
//! Behaves like a hosted queue: received messages are hidden rather than
//! removed, come back after the visibility timeout unless acknowledged, and
//! move to the dead-letter list once they exhaust `max_receive_count`.

use crate::config::QueueConfig;
use crate::message::{DeadLetter, QueueMessage, QueueReceiver, QueueSender, Receipt};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use telemetry::metrics;
use tick_core::Result;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
struct Entry {
    id: String,
    body: Vec<u8>,
    receive_count: u32,
    /// Hidden until this instant while a delivery is outstanding
    invisible_until: Option<Instant>,
    receipt: Option<Receipt>,
}

impl Entry {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |t| t <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    dead_letters: Vec<DeadLetter>,
}

/// In-memory queue.
pub struct MemoryQueue {
    state: Mutex<State>,
    notify: Notify,
    visibility_timeout: Duration,
    max_receive_count: u32,
    wait_time: Duration,
}

impl MemoryQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            visibility_timeout: Duration::from_millis(config.visibility_timeout_ms),
            max_receive_count: config.max_receive_count.max(1),
            wait_time: Duration::from_millis(config.wait_time_ms),
        }
    }

    /// Messages that exhausted their deliveries or were rejected.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead_letters.clone()
    }

    /// Messages not yet acknowledged (visible or in flight).
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages currently hidden by an outstanding delivery.
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| !e.is_visible(now))
            .count()
    }

    /// Takes up to `max` visible messages, dead-lettering exhausted ones.
    ///
    /// Returns the messages and the earliest instant a hidden one becomes
    /// visible again.
    fn take_visible(&self, max: usize) -> (Vec<QueueMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let mut delivered = Vec::new();
        let mut next_visible: Option<Instant> = None;
        let mut i = 0;

        while i < state.entries.len() && delivered.len() < max {
            let entry = &mut state.entries[i];

            if !entry.is_visible(now) {
                if let Some(t) = entry.invisible_until {
                    next_visible = Some(next_visible.map_or(t, |n| n.min(t)));
                }
                i += 1;
                continue;
            }

            if entry.receive_count >= self.max_receive_count {
                let entry = state.entries.remove(i);
                warn!(
                    message_id = %entry.id,
                    receive_count = entry.receive_count,
                    "Message exhausted its deliveries, dead-lettering"
                );
                state.dead_letters.push(DeadLetter {
                    id: entry.id,
                    body: entry.body,
                    receive_count: entry.receive_count,
                    reason: format!(
                        "max receive count {} exceeded",
                        self.max_receive_count
                    ),
                });
                metrics().messages_dead_lettered.inc();
                continue;
            }

            let receipt = Receipt(Uuid::new_v4().to_string());
            entry.receive_count += 1;
            entry.invisible_until = Some(now + self.visibility_timeout);
            entry.receipt = Some(receipt.clone());

            delivered.push(QueueMessage {
                id: entry.id.clone(),
                body: entry.body.clone(),
                receive_count: entry.receive_count,
                receipt,
            });
            i += 1;
        }

        (delivered, next_visible)
    }

    fn remove_by_receipt(state: &mut State, receipt: &Receipt) -> Option<Entry> {
        let pos = state
            .entries
            .iter()
            .position(|e| e.receipt.as_ref() == Some(receipt))?;
        Some(state.entries.remove(pos))
    }
}

#[async_trait]
impl QueueSender for MemoryQueue {
    async fn send(&self, body: String) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.state.lock().entries.push(Entry {
            id: id.clone(),
            body: body.into_bytes(),
            receive_count: 0,
            invisible_until: None,
            receipt: None,
        });
        self.notify.notify_one();
        Ok(id)
    }
}

#[async_trait]
impl QueueReceiver for MemoryQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + self.wait_time;
        loop {
            let (messages, next_visible) = self.take_visible(max);
            if !messages.is_empty() {
                debug!(count = messages.len(), "Received messages");
                return Ok(messages);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_visible.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, receipts: &[Receipt]) -> Result<usize> {
        let mut state = self.state.lock();
        let mut acked = 0;
        for receipt in receipts {
            if Self::remove_by_receipt(&mut state, receipt).is_some() {
                acked += 1;
            } else {
                debug!(receipt = %receipt, "Ignoring stale receipt");
            }
        }
        Ok(acked)
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        let mut state = self.state.lock();
        if Self::remove_by_receipt(&mut state, &message.receipt).is_some() {
            state.dead_letters.push(DeadLetter {
                id: message.id.clone(),
                body: message.body.clone(),
                receive_count: message.receive_count,
                reason: reason.to_string(),
            });
            metrics().messages_dead_lettered.inc();
        }
        Ok(())
    }

    fn depth(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}
