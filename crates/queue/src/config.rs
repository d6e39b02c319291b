//! Queue configuration.

use serde::{Deserialize, Serialize};
use tick_core::limits::{DEFAULT_MAX_RECEIVE_COUNT, DEFAULT_VISIBILITY_TIMEOUT_MS};

/// Which queue implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// In-process queue (standalone runs and tests)
    #[default]
    Memory,
    /// Redpanda / Kafka topic
    Redpanda,
}

/// Delivery semantics shared by every backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    /// Maximum messages handed to one ingestor batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How long a received, unacknowledged message stays hidden
    #[serde(default = "default_visibility_timeout_ms")]
    pub visibility_timeout_ms: u64,
    /// Deliveries after which a message is dead-lettered
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,
    /// Long-poll wait when the queue is empty
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,
    #[serde(default)]
    pub redpanda: RedpandaConfig,
}

fn default_batch_size() -> usize {
    10
}

fn default_visibility_timeout_ms() -> u64 {
    DEFAULT_VISIBILITY_TIMEOUT_MS
}

fn default_max_receive_count() -> u32 {
    DEFAULT_MAX_RECEIVE_COUNT
}

fn default_wait_time_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            batch_size: default_batch_size(),
            visibility_timeout_ms: default_visibility_timeout_ms(),
            max_receive_count: default_max_receive_count(),
            wait_time_ms: default_wait_time_ms(),
            redpanda: RedpandaConfig::default(),
        }
    }
}

/// Where a consumer starts reading when no offset has been committed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    #[default]
    Earliest,
    Latest,
}

/// Redpanda connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Topic carrying ticks
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Topic receiving dead-lettered messages
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    /// Compacted topic holding the consumer's committed read position
    #[serde(default = "default_offsets_topic")]
    pub offsets_topic: String,
    /// SASL username (for cloud authentication)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password (for cloud authentication)
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default)]
    pub start_offset: StartOffset,
}

fn default_topic() -> String {
    "ticks".to_string()
}

fn default_dead_letter_topic() -> String {
    "ticks-dlq".to_string()
}

fn default_offsets_topic() -> String {
    "ticks-offsets".to_string()
}

fn default_compression() -> String {
    "lz4".to_string()
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: default_topic(),
            dead_letter_topic: default_dead_letter_topic(),
            offsets_topic: default_offsets_topic(),
            sasl_username: None,
            sasl_password: None,
            compression: default_compression(),
            start_offset: StartOffset::default(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }
}
