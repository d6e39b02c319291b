//! The queue contract shared by the producer and the ingestor.

use async_trait::async_trait;
use tick_core::Result;

/// Handle for acknowledging one delivery of a message.
///
/// A redelivered message gets a fresh receipt; acknowledging with a stale
/// one is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt(pub String);

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as delivered to a consumer.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Queue-assigned message id, stable across redeliveries
    pub id: String,
    pub body: Vec<u8>,
    /// How many times this message has been delivered, including this one
    pub receive_count: u32,
    pub receipt: Receipt,
}

impl QueueMessage {
    /// Body as text, for logs and dead-letter payloads.
    pub fn body_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A message moved aside after it could not be processed.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub id: String,
    pub body: Vec<u8>,
    pub receive_count: u32,
    pub reason: String,
}

/// Producer side of the queue.
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// Enqueues one message body and returns its message id.
    async fn send(&self, body: String) -> Result<String>;

    /// Checks if the queue is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Consumer side of the queue.
///
/// Delivery is at-least-once: every received message stays owned by the
/// consumer until acknowledged, dead-lettered, or its visibility timeout
/// expires, after which it is delivered again.
#[async_trait]
pub trait QueueReceiver: Send + Sync {
    /// Receives up to `max` messages, waiting briefly when the queue is empty.
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>>;

    /// Acknowledges processed messages. Returns how many receipts were live.
    async fn ack(&self, receipts: &[Receipt]) -> Result<usize>;

    /// Moves a message to the dead-letter destination and acknowledges it.
    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()>;

    /// Messages waiting or in flight, when the backend can tell.
    fn depth(&self) -> Option<u64> {
        None
    }

    /// Checks if the queue is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
