//! Tick ingestion: validate, enrich, store, alert.
//!
//! Each message is handled independently. A malformed body never affects
//! the rest of its batch, and a stored tick is acknowledged even when its
//! alert could not be published.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use queue::{QueueMessage, Receipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::BlobStore;
use telemetry::{health, metrics};
use tick_core::{Error, KeyScheme, ProcessedTick, Tick};
use tracing::{debug, error, info, warn};

use crate::alerts::{alert_message, should_alert, AlertTarget};

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// How stored object keys are derived
    #[serde(default)]
    pub key_scheme: KeyScheme,
    /// Messages of one batch processed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            key_scheme: KeyScheme::default(),
            concurrency: default_concurrency(),
        }
    }
}

/// What happened to the alert for a stored tick.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// Price below the threshold
    NotTriggered,
    /// Price crossed the threshold but no topic is configured
    Disabled,
    Published(String),
    Failed(String),
}

/// Result of processing one message.
#[derive(Debug)]
pub enum MessageOutcome {
    Stored {
        key: String,
        record: ProcessedTick,
        alert: AlertOutcome,
    },
    /// Body failed to parse or validate; retrying cannot help
    Malformed(Error),
    /// Storage failed; the message must be left for redelivery
    StoreFailed(Error),
}

impl MessageOutcome {
    /// Whether the message should be acknowledged.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// A message the ingestor could not store.
#[derive(Debug)]
pub struct Rejected {
    pub message: QueueMessage,
    pub error: Error,
}

/// Per-batch summary.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub received: usize,
    /// Keys written, in completion order
    pub stored_keys: Vec<String>,
    /// Receipts of successfully stored messages
    pub acked: Vec<Receipt>,
    pub malformed: Vec<Rejected>,
    pub store_failures: Vec<Rejected>,
    pub alerts_published: usize,
    pub alert_failures: usize,
}

impl BatchReport {
    pub fn stored(&self) -> usize {
        self.stored_keys.len()
    }

    /// Messages left for redelivery.
    pub fn retry_count(&self) -> usize {
        self.store_failures.len()
    }
}

/// Turns queue messages into stored records and alerts.
pub struct Ingestor {
    store: Arc<dyn BlobStore>,
    alerts: Option<AlertTarget>,
    threshold: f64,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn BlobStore>,
        alerts: Option<AlertTarget>,
        threshold: f64,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            alerts,
            threshold,
            config,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn alerting_enabled(&self) -> bool {
        self.alerts.is_some()
    }

    /// Processes one message end to end.
    pub async fn process_message(&self, message: &QueueMessage) -> MessageOutcome {
        let now = Utc::now();

        let tick = match Tick::parse(&message.body) {
            Ok(tick) => tick,
            Err(e) => {
                metrics().malformed_payloads.inc();
                warn!(
                    message_id = %message.id,
                    error = %e,
                    body = %truncate(&message.body_lossy(), 256),
                    "Rejecting malformed tick"
                );
                return MessageOutcome::Malformed(e);
            }
        };

        let record = tick.enrich(now);
        let key = self
            .config
            .key_scheme
            .key(&record.symbol, now, &message.id);

        if let Err(e) = self.write(&key, &record).await {
            metrics().store_write_errors.inc();
            health().store.set_unhealthy(e.to_string());
            error!(
                message_id = %message.id,
                key = %key,
                receive_count = message.receive_count,
                error = %e,
                "Failed to store tick"
            );
            return MessageOutcome::StoreFailed(e);
        }

        metrics().ticks_stored.inc();
        health().store.set_healthy();
        debug!(key = %key, symbol = %record.symbol, price = record.price, "Stored tick");

        let alert = self.alert(&record).await;
        MessageOutcome::Stored { key, record, alert }
    }

    /// Processes a batch with bounded concurrency and sorts the outcomes.
    ///
    /// Acknowledging and dead-lettering are left to the caller.
    pub async fn process_batch(&self, messages: Vec<QueueMessage>) -> BatchReport {
        let mut report = BatchReport {
            received: messages.len(),
            ..BatchReport::default()
        };

        let outcomes: Vec<(QueueMessage, MessageOutcome)> = stream::iter(messages)
            .map(|message| async move {
                let outcome = self.process_message(&message).await;
                (message, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (message, outcome) in outcomes {
            match outcome {
                MessageOutcome::Stored { key, alert, .. } => {
                    match alert {
                        AlertOutcome::Published(_) => report.alerts_published += 1,
                        AlertOutcome::Failed(_) => report.alert_failures += 1,
                        AlertOutcome::NotTriggered | AlertOutcome::Disabled => {}
                    }
                    report.stored_keys.push(key);
                    report.acked.push(message.receipt);
                }
                MessageOutcome::Malformed(error) => {
                    report.malformed.push(Rejected { message, error });
                }
                MessageOutcome::StoreFailed(error) => {
                    report.store_failures.push(Rejected { message, error });
                }
            }
        }

        report
    }

    async fn write(&self, key: &str, record: &ProcessedTick) -> tick_core::Result<()> {
        let body = record
            .to_bytes()
            .map_err(|e| Error::store_write(key, format!("failed to serialize record: {}", e)))?;
        self.store.put(key, body).await
    }

    async fn alert(&self, record: &ProcessedTick) -> AlertOutcome {
        if !should_alert(record.price, self.threshold) {
            return AlertOutcome::NotTriggered;
        }

        let Some(target) = &self.alerts else {
            debug!(symbol = %record.symbol, price = record.price, "Threshold crossed, alerting disabled");
            return AlertOutcome::Disabled;
        };

        let message = alert_message(record);
        match target.publish(&message).await {
            Ok(()) => {
                metrics().alerts_published.inc();
                health().alerts.set_healthy();
                info!(
                    topic = %target.topic,
                    symbol = %record.symbol,
                    price = record.price,
                    "Published price alert"
                );
                AlertOutcome::Published(message)
            }
            Err(e) => {
                metrics().alert_publish_errors.inc();
                health().alerts.set_unhealthy(e.to_string());
                warn!(
                    topic = %target.topic,
                    symbol = %record.symbol,
                    error = %e,
                    "Failed to publish price alert"
                );
                AlertOutcome::Failed(e.to_string())
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
