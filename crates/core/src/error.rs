//! Unified error types for the tick pipeline.
//!
//! Every variant carries a stable code so log lines and dead-letter reasons
//! can be grepped without parsing free text:
//! - TICK_001: Malformed payload
//! - STORE_001: Durable store write failure
//! - ALERT_001: Alert publish failure
//! - QUEUE_001/002: Queue send / receive failures
//! - CONFIG_001: Invalid configuration

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the tick pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The message body could not be turned into a valid tick.
    #[error("[TICK_001] malformed payload: {0}")]
    MalformedPayload(String),

    /// The enriched record could not be persisted.
    #[error("[STORE_001] failed to write {key}: {message}")]
    StoreWrite { key: String, message: String },

    /// A threshold alert could not be delivered.
    #[error("[ALERT_001] failed to publish alert to {topic}: {message}")]
    AlertPublish { topic: String, message: String },

    #[error("[QUEUE_001] failed to send message: {0}")]
    QueueSend(String),

    #[error("[QUEUE_002] queue operation failed: {0}")]
    QueueReceive(String),

    #[error("[CONFIG_001] invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn store_write(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StoreWrite {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn alert_publish(topic: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AlertPublish {
            topic: topic.into(),
            message: msg.into(),
        }
    }

    pub fn queue_send(msg: impl Into<String>) -> Self {
        Self::QueueSend(msg.into())
    }

    pub fn queue_receive(msg: impl Into<String>) -> Self {
        Self::QueueReceive(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "TICK_001",
            Self::StoreWrite { .. } => "STORE_001",
            Self::AlertPublish { .. } => "ALERT_001",
            Self::QueueSend(_) => "QUEUE_001",
            Self::QueueReceive(_) => "QUEUE_002",
            Self::Config(_) => "CONFIG_001",
            Self::Serialization(_) => "SER_001",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether redelivering the message could succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreWrite { .. } | Self::QueueReceive(_) | Self::Internal(_)
        )
    }
}
