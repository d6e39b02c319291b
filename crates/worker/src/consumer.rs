//! Consumer worker driving the ingestor from the queue.
//!
//! Each iteration:
//! 1. Receive a batch
//! 2. Process every message (store, alert)
//! 3. Acknowledge stored messages and dead-letter malformed ones
//! 4. Leave store failures unacknowledged so the queue redelivers them

use queue::QueueReceiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tick_core::Result;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ingestor::{BatchReport, Ingestor};

/// Consumer worker configuration.
#[derive(Debug, Clone)]
pub struct ConsumerWorkerConfig {
    /// Maximum messages per receive
    pub batch_size: usize,
    /// Pause after a failed receive
    pub error_backoff: Duration,
    /// Pause after an empty receive
    pub idle_backoff: Duration,
}

impl Default for ConsumerWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            error_backoff: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(100),
        }
    }
}

/// Worker that feeds queue batches through the ingestor.
pub struct ConsumerWorker {
    queue: Arc<dyn QueueReceiver>,
    ingestor: Arc<Ingestor>,
    config: ConsumerWorkerConfig,
}

impl ConsumerWorker {
    pub fn new(queue: Arc<dyn QueueReceiver>, ingestor: Arc<Ingestor>) -> Self {
        Self::with_config(queue, ingestor, ConsumerWorkerConfig::default())
    }

    pub fn with_config(
        queue: Arc<dyn QueueReceiver>,
        ingestor: Arc<Ingestor>,
        config: ConsumerWorkerConfig,
    ) -> Self {
        Self {
            queue,
            ingestor,
            config,
        }
    }

    /// Main run loop - receive, process, settle.
    ///
    /// Runs until `shutdown` flips to true or its sender is dropped. The batch in progress is always
    /// settled before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.config.batch_size,
            threshold = self.ingestor.threshold(),
            alerting = self.ingestor.alerting_enabled(),
            "Consumer worker starting"
        );

        while !*shutdown.borrow() {
            match self.process_batch().await {
                Ok(report) if report.received == 0 => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.idle_backoff) => {}
                        changed = shutdown.changed() => if changed.is_err() { break; }
                    }
                }
                Ok(report) => {
                    debug!(
                        received = report.received,
                        stored = report.stored(),
                        malformed = report.malformed.len(),
                        retry = report.retry_count(),
                        "Processed batch"
                    );
                }
                Err(e) => {
                    metrics().queue_receive_errors.inc();
                    health().queue.set_unhealthy(e.to_string());
                    error!("Batch processing error: {}", e);

                    tokio::select! {
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                        changed = shutdown.changed() => if changed.is_err() { break; }
                    }
                }
            }
        }

        info!("Consumer worker stopped");
    }

    /// Processes a single batch: receive → ingest → ack / dead-letter.
    pub async fn process_batch(&self) -> Result<BatchReport> {
        let messages = self.queue.receive(self.config.batch_size).await?;
        health().queue.set_healthy();

        if let Some(depth) = self.queue.depth() {
            metrics().queue_depth.set(depth);
        }

        if messages.is_empty() {
            return Ok(BatchReport::default());
        }

        let start = Instant::now();
        metrics().batches_received.inc();
        metrics().messages_received.inc_by(messages.len() as u64);
        metrics().in_flight.set(messages.len() as u64);

        let report = self.ingestor.process_batch(messages).await;

        if !report.acked.is_empty() {
            match self.queue.ack(&report.acked).await {
                Ok(acked) => {
                    metrics().messages_acked.inc_by(acked as u64);
                    if acked < report.acked.len() {
                        warn!(
                            expected = report.acked.len(),
                            acked = acked,
                            "Some receipts expired before acknowledgement, messages will be redelivered"
                        );
                    }
                }
                // Unacked messages come back after the visibility timeout.
                Err(e) => error!(count = report.acked.len(), error = %e, "Failed to acknowledge batch"),
            }
        }

        for rejected in &report.malformed {
            let reason = rejected.error.to_string();
            match self.queue.dead_letter(&rejected.message, &reason).await {
                Ok(()) => {
                    info!(message_id = %rejected.message.id, reason = %reason, "Dead-lettered malformed message");
                }
                Err(e) => error!(
                    message_id = %rejected.message.id,
                    error = %e,
                    "Failed to dead-letter malformed message"
                ),
            }
        }

        for failed in &report.store_failures {
            if failed.error.is_retryable() {
                warn!(
                    message_id = %failed.message.id,
                    receive_count = failed.message.receive_count,
                    "Leaving message for redelivery"
                );
                continue;
            }

            let reason = failed.error.to_string();
            if let Err(e) = self.queue.dead_letter(&failed.message, &reason).await {
                error!(
                    message_id = %failed.message.id,
                    error = %e,
                    "Failed to dead-letter unrecoverable message"
                );
            }
        }

        metrics().in_flight.set(0);
        metrics()
            .batch_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        Ok(report)
    }
}
