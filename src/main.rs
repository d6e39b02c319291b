//! Tick pipeline
//!
//! Synthetic market-data pipeline handling:
//! - Random tick generation on a fixed cadence
//! - At-least-once queue transport with redelivery and dead-lettering
//! - Tick validation, enrichment and durable storage
//! - Threshold price alerts

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use api::{router, AppState};
use queue::{MemoryQueue, QueueBackend, QueueConfig, QueueReceiver, QueueSender, RedpandaQueue};
use store::{BlobStore, ClickHouseClient, ClickHouseStore, MemoryStore, StoreBackend, StoreConfig};
use telemetry::{health, init_tracing_from_env};
use worker::{AlertTarget, ConsumerWorkerConfig, Ingestor, WorkerConfig, WorkerScheduler};

use crate::config::{load_config, AppConfig};

/// Both ends of the configured queue.
struct QueueHandles {
    sender: Arc<dyn QueueSender>,
    receiver: Arc<dyn QueueReceiver>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    // rustls 0.23+ requires explicit crypto provider selection before any TLS
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting tick pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.validate().context("Invalid configuration")?;

    info!(
        role = config.role.as_str(),
        queue = ?config.queue.backend,
        store = ?config.store.backend,
        bucket = %config.store.bucket,
        alert_topic = config.alert.topic().unwrap_or("none"),
        threshold = config.alert.threshold,
        "Loaded configuration"
    );

    if config.has_isolated_memory_queue() {
        warn!(
            role = config.role.as_str(),
            "In-memory queue outside standalone role, nothing will flow between processes"
        );
    }

    let queue = build_queue(&config.queue).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut scheduler = WorkerScheduler::new(WorkerConfig::default());

    if config.role.runs_producer() {
        scheduler = scheduler.with_producer(config.producer.clone(), queue.sender.clone());
    }

    if config.role.runs_ingestor() {
        let store = build_store(&config.store).await;
        let alerts = AlertTarget::from_config(&config.alert)
            .context("Failed to configure alerting")?;
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            alerts,
            config.alert.threshold,
            config.ingest.clone(),
        ));

        scheduler = scheduler
            .with_consumer(
                queue.receiver.clone(),
                ingestor,
                ConsumerWorkerConfig {
                    batch_size: config.queue.batch_size,
                    ..ConsumerWorkerConfig::default()
                },
            )
            .with_store(store);
    } else {
        // Producers never write to the store.
        health().store.set_healthy();
    }
    health().alerts.set_healthy();

    let handles = scheduler
        .start(shutdown_rx)
        .context("Failed to start workers")?;

    if config.http.enabled {
        serve_http(&config, &queue).await?;
    } else {
        shutdown_signal().await;
    }

    info!("Shutting down...");
    if shutdown_tx.send(true).is_err() {
        warn!("All workers had already stopped");
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Worker task failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Builds the queue and reports its initial health.
async fn build_queue(config: &QueueConfig) -> QueueHandles {
    match config.backend {
        QueueBackend::Memory => {
            info!("Using in-memory queue");
            health().queue.set_healthy();
            let queue = Arc::new(MemoryQueue::new(config));
            QueueHandles {
                sender: queue.clone(),
                receiver: queue,
            }
        }
        QueueBackend::Redpanda => {
            info!(
                brokers = %config.redpanda.broker_string(),
                topic = %config.redpanda.topic,
                dead_letter_topic = %config.redpanda.dead_letter_topic,
                sasl_username = config.redpanda.sasl_username.as_deref().unwrap_or("none"),
                "Using Redpanda queue"
            );

            if queue::health::check_connection(&config.redpanda).await {
                health().queue.set_healthy();
                info!("Redpanda connection: healthy");

                let missing = queue::health::missing_topics(&config.redpanda).await;
                if !missing.is_empty() {
                    warn!(topics = ?missing, "Redpanda topics not found, create them before producing");
                }
            } else {
                health().queue.set_unhealthy("Connection failed");
                error!("Redpanda connection: unhealthy");
            }

            let queue = Arc::new(RedpandaQueue::new(config));
            QueueHandles {
                sender: queue.clone(),
                receiver: queue,
            }
        }
    }
}

/// Builds the store, preparing the ClickHouse schema when needed.
async fn build_store(config: &StoreConfig) -> Arc<dyn BlobStore> {
    match config.backend {
        StoreBackend::Memory => {
            warn!(bucket = %config.bucket, "Using in-memory store, records are lost on exit");
            health().store.set_healthy();
            Arc::new(MemoryStore::new(config.bucket.clone()))
        }
        StoreBackend::Clickhouse => {
            let client = ClickHouseClient::new(&config.clickhouse);

            if client.ping().await {
                health().store.set_healthy();
                info!("ClickHouse connection: healthy");
            } else {
                health().store.set_unhealthy("Connection failed");
                error!("ClickHouse connection: unhealthy");
            }

            // Continue anyway - schema might already exist
            if let Err(e) = client.prepare_schema().await {
                error!("Failed to initialize ClickHouse schema: {}", e);
            }

            Arc::new(ClickHouseStore::new(client, config.bucket.clone()))
        }
    }
}

/// Serves health, metrics and tick submission until a shutdown signal.
async fn serve_http(config: &AppConfig, queue: &QueueHandles) -> Result<()> {
    let mut state = AppState::new(config.role.as_str());
    if config.role.runs_producer() {
        state = state.with_queue(queue.sender.clone());
    }

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
