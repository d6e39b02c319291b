//! Worker scheduler for the producer, the ingestor, and periodic checks.

use queue::{QueueReceiver, QueueSender};
use std::sync::Arc;
use std::time::Duration;
use store::BlobStore;
use telemetry::{health, metrics};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::consumer::{ConsumerWorker, ConsumerWorkerConfig};
use crate::ingestor::Ingestor;
use crate::producer::{ProducerConfig, TickProducer};

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Dependency health check interval
    pub health_check_interval: Duration,
    /// Metrics summary log interval
    pub metrics_log_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

struct ProducerSetup {
    config: ProducerConfig,
    queue: Arc<dyn QueueSender>,
}

struct ConsumerSetup {
    queue: Arc<dyn QueueReceiver>,
    ingestor: Arc<Ingestor>,
    config: ConsumerWorkerConfig,
}

/// Starts the configured workers and stops them together.
pub struct WorkerScheduler {
    config: WorkerConfig,
    producer: Option<ProducerSetup>,
    consumer: Option<ConsumerSetup>,
    store: Option<Arc<dyn BlobStore>>,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            producer: None,
            consumer: None,
            store: None,
        }
    }

    /// Adds the tick producer.
    pub fn with_producer(mut self, config: ProducerConfig, queue: Arc<dyn QueueSender>) -> Self {
        self.producer = Some(ProducerSetup { config, queue });
        self
    }

    /// Adds the consumer worker (queue → ingestor).
    pub fn with_consumer(
        mut self,
        queue: Arc<dyn QueueReceiver>,
        ingestor: Arc<Ingestor>,
        config: ConsumerWorkerConfig,
    ) -> Self {
        self.consumer = Some(ConsumerSetup {
            queue,
            ingestor,
            config,
        });
        self
    }

    /// Adds a store to the periodic health checks.
    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Starts all configured workers.
    ///
    /// Every task exits once `shutdown` flips to true or its sender is dropped.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tick_core::Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();

        if let Some(setup) = self.producer {
            let producer = TickProducer::new(setup.config, setup.queue)?;
            handles.push(tokio::spawn(producer.run(shutdown.clone())));
            info!("Tick producer started");
        }

        let mut receiver = None;
        if let Some(setup) = self.consumer {
            receiver = Some(setup.queue.clone());
            let worker = ConsumerWorker::with_config(setup.queue, setup.ingestor, setup.config);
            let rx = shutdown.clone();
            handles.push(tokio::spawn(async move { worker.run(rx).await }));
            info!("Consumer worker started");
        }

        if receiver.is_some() || self.store.is_some() {
            let checks = HealthChecks {
                queue: receiver,
                store: self.store,
            };
            handles.push(tokio::spawn(run_health_checks(
                checks,
                self.config.health_check_interval,
                shutdown.clone(),
            )));
        }

        handles.push(tokio::spawn(run_metrics_log(
            self.config.metrics_log_interval,
            shutdown,
        )));

        info!(workers = handles.len(), "Background workers started");
        Ok(handles)
    }
}

struct HealthChecks {
    queue: Option<Arc<dyn QueueReceiver>>,
    store: Option<Arc<dyn BlobStore>>,
}

async fn run_health_checks(
    checks: HealthChecks,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => if changed.is_err() { break; }
        }
        if *shutdown.borrow() {
            break;
        }

        if let Some(queue) = &checks.queue {
            if queue.health_check().await {
                health().queue.set_healthy();
            } else {
                health().queue.set_unhealthy("queue unreachable");
                warn!("Queue health check failed");
            }
        }

        if let Some(store) = &checks.store {
            if store.health_check().await {
                health().store.set_healthy();
            } else {
                health().store.set_unhealthy(format!("bucket {} unreachable", store.bucket()));
                error!(bucket = store.bucket(), "Store health check failed");
            }
        }
    }
}

async fn run_metrics_log(period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => if changed.is_err() { break; }
        }
        if *shutdown.borrow() {
            break;
        }

        let snapshot = metrics().snapshot();
        info!(
            produced = snapshot.ticks_produced,
            received = snapshot.messages_received,
            stored = snapshot.ticks_stored,
            malformed = snapshot.malformed_payloads,
            dead_lettered = snapshot.messages_dead_lettered,
            alerts = snapshot.alerts_published,
            store_errors = snapshot.store_write_errors,
            queue_depth = snapshot.queue_depth,
            "Pipeline metrics"
        );
    }
}
