//! Common test setup functions.

use api::{router, state::AppState};
use axum::Router;
use queue::{MemoryQueue, QueueConfig, QueueSender};
use std::sync::Arc;
use store::BlobStore;
use tick_core::{KeyScheme, ProcessedTick, Result};
use worker::{
    AlertTarget, BatchReport, ConsumerWorker, ConsumerWorkerConfig, IngestConfig, Ingestor,
};

use crate::mocks::{MockStore, RecordingAlertSink};

/// Knobs for a test pipeline.
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub threshold: f64,
    /// Alerting is disabled when unset
    pub alert_topic: Option<String>,
    pub key_scheme: KeyScheme,
    pub visibility_timeout_ms: u64,
    pub max_receive_count: u32,
    pub batch_size: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            threshold: 1200.0,
            alert_topic: Some("price-alerts".to_string()),
            key_scheme: KeyScheme::MessageId,
            visibility_timeout_ms: 30_000,
            max_receive_count: 5,
            batch_size: 10,
        }
    }
}

/// Test context wiring the real ingestor to the in-memory queue.
///
/// This provides the same production code paths by:
/// - Using the real `Ingestor` and `ConsumerWorker`
/// - Using `MemoryQueue` for visibility timeouts and dead-lettering
/// - Using `MockStore` and `RecordingAlertSink` to inject failures
/// - Using the real Axum router for `POST /ticks` and health routes
pub struct TestContext {
    pub queue: Arc<MemoryQueue>,
    pub store: MockStore,
    pub alerts: RecordingAlertSink,
    pub worker: ConsumerWorker,
    pub router: Router,
}

impl TestContext {
    /// Create a new test context with default options.
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let queue = Arc::new(MemoryQueue::new(&QueueConfig {
            visibility_timeout_ms: options.visibility_timeout_ms,
            max_receive_count: options.max_receive_count,
            wait_time_ms: 0,
            batch_size: options.batch_size,
            ..QueueConfig::default()
        }));
        let store = MockStore::new("test-ticks");
        let alerts = RecordingAlertSink::new();

        let target = options
            .alert_topic
            .map(|topic| AlertTarget::new(Arc::new(alerts.clone()), topic));
        let ingestor = Arc::new(Ingestor::new(
            Arc::new(store.clone()),
            target,
            options.threshold,
            IngestConfig {
                key_scheme: options.key_scheme,
                concurrency: 4,
            },
        ));

        let worker = ConsumerWorker::with_config(
            queue.clone(),
            ingestor,
            ConsumerWorkerConfig {
                batch_size: options.batch_size,
                ..ConsumerWorkerConfig::default()
            },
        );

        let state = AppState::new("standalone").with_queue(queue.clone());
        let router = router(state);

        Self {
            queue,
            store,
            alerts,
            worker,
            router,
        }
    }

    /// Enqueue a raw message body.
    pub async fn send(&self, body: impl Into<String>) -> String {
        self.queue
            .send(body.into())
            .await
            .expect("memory queue send never fails")
    }

    /// Run one consumer iteration.
    pub async fn process_batch(&self) -> Result<BatchReport> {
        self.worker.process_batch().await
    }

    /// Run consumer iterations until a receive comes back empty.
    pub async fn drain(&self) -> Vec<BatchReport> {
        let mut reports = Vec::new();
        loop {
            let report = self
                .process_batch()
                .await
                .expect("memory queue receive never fails");
            if report.received == 0 {
                return reports;
            }
            reports.push(report);
        }
    }

    /// Every stored record, decoded.
    pub async fn stored_records(&self) -> Vec<(String, ProcessedTick)> {
        let mut records = Vec::new();
        for key in self.store.memory().keys() {
            let body = self
                .store
                .get(&key)
                .await
                .expect("memory store get never fails")
                .expect("listed key exists");
            let record = ProcessedTick::from_bytes(&body).expect("stored records decode");
            records.push((key, record));
        }
        records
    }

    /// Stored records for one symbol.
    pub async fn stored_for(&self, symbol: &str) -> Vec<ProcessedTick> {
        self.stored_records()
            .await
            .into_iter()
            .filter(|(_, r)| r.symbol == symbol)
            .map(|(_, r)| r)
            .collect()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
