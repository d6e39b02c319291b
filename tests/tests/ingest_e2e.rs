//! End-to-end tests for the tick pipeline.
//!
//! These tests validate the full data flow using the in-memory queue:
//! producer / POST /ticks → MemoryQueue → ConsumerWorker → Ingestor →
//! MockStore + RecordingAlertSink

use axum_test::TestServer;
use chrono::NaiveDateTime;
use integration_tests::{
    fixtures,
    setup::{TestContext, TestOptions},
};
use queue::QueueSender;
use std::sync::Arc;
use std::time::Duration;
use tick_core::{GeneratorConfig, KeyScheme, PROCESSED_AT_FORMAT};
use tokio::sync::watch;
use worker::{ProducerConfig, TickProducer};

/// AAPL above the threshold: stored with processed_at, one alert.
#[tokio::test]
async fn test_price_above_threshold_is_stored_and_alerted() {
    let ctx = TestContext::new();
    ctx.send(fixtures::aapl_above_threshold()).await;

    let reports = ctx.drain().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stored(), 1);
    assert_eq!(reports[0].alerts_published, 1);

    let records = ctx.stored_for("AAPL").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, 1500.0);
    assert_eq!(records[0].volume, 500);
    assert!(NaiveDateTime::parse_from_str(&records[0].processed_at, PROCESSED_AT_FORMAT).is_ok());

    let alerts = ctx.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "price-alerts");
    assert!(alerts[0].1.contains("AAPL"));
    assert!(alerts[0].1.contains("1500.0"));
    assert!(alerts[0].1.contains(&records[0].processed_at));

    assert!(ctx.queue.is_empty(), "stored message should be acknowledged");
}

/// TSLA below the threshold: stored, no alert.
#[tokio::test]
async fn test_price_below_threshold_is_stored_without_alert() {
    let ctx = TestContext::new();
    ctx.send(fixtures::tsla_below_threshold()).await;
    ctx.drain().await;

    let records = ctx.stored_for("TSLA").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, 999.99);
    assert_eq!(ctx.alerts.count(), 0);
    assert!(ctx.queue.is_empty());
}

/// A price exactly at the threshold alerts.
#[tokio::test]
async fn test_price_at_threshold_alerts() {
    let ctx = TestContext::new();
    ctx.send(fixtures::tick_json("MSFT", 1200.0, 1)).await;
    ctx.send(fixtures::tick_json("MSFT", 1199.99, 1)).await;
    ctx.drain().await;

    let alerts = ctx.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].1.contains("$1200.0 "));
}

/// Custom threshold from configuration is honoured.
#[tokio::test]
async fn test_custom_threshold() {
    let ctx = TestContext::with_options(TestOptions {
        threshold: 500.0,
        ..TestOptions::default()
    });
    ctx.send(fixtures::tsla_below_threshold()).await;
    ctx.drain().await;

    assert_eq!(ctx.alerts.count(), 1);
}

/// No alert topic: alerting is skipped without error.
#[tokio::test]
async fn test_alerting_disabled_without_topic() {
    let ctx = TestContext::with_options(TestOptions {
        alert_topic: None,
        ..TestOptions::default()
    });
    ctx.send(fixtures::aapl_above_threshold()).await;

    let reports = ctx.drain().await;
    assert_eq!(reports[0].stored(), 1);
    assert_eq!(reports[0].alerts_published, 0);
    assert_eq!(reports[0].alert_failures, 0);
    assert_eq!(ctx.alerts.count(), 0);
    assert!(ctx.queue.is_empty());
}

/// Stored records read back to the original fields.
#[tokio::test]
async fn test_store_round_trip() {
    let ctx = TestContext::new();
    let bodies = fixtures::random_ticks(20, 42);
    for body in &bodies {
        ctx.send(body.clone()).await;
    }
    ctx.drain().await;

    let records = ctx.stored_records().await;
    assert_eq!(records.len(), bodies.len());

    for body in &bodies {
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        let found = records.iter().any(|(_, r)| {
            r.symbol == sent["symbol"].as_str().unwrap()
                && r.price == sent["price"].as_f64().unwrap()
                && r.volume == sent["volume"].as_u64().unwrap()
        });
        assert!(found, "no stored record for {}", body);
    }

    for (key, record) in &records {
        assert!(key.starts_with(&format!("processed/{}/", record.symbol)));
        assert!(key.ends_with(".json"));
        assert!(record.processed_at_time().is_ok());
    }
}

/// Seconds keys collide within a second and the later write wins.
#[tokio::test]
async fn test_seconds_key_scheme_last_write_wins() {
    let ctx = TestContext::with_options(TestOptions {
        key_scheme: KeyScheme::Seconds,
        batch_size: 1,
        ..TestOptions::default()
    });

    ctx.send(fixtures::tick_json("GOOG", 120.5, 300)).await;
    ctx.send(fixtures::tick_json("GOOG", 121.0, 10)).await;
    ctx.drain().await;

    let attempts = ctx.store.attempts();
    assert_eq!(attempts.len(), 2);
    if attempts[0] == attempts[1] {
        let records = ctx.stored_for("GOOG").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 121.0);
    }
}

/// Producer → queue → ingestor with the real producer loop.
#[tokio::test(start_paused = true)]
async fn test_producer_to_ingestor_end_to_end() {
    let ctx = TestContext::new();

    let producer = TickProducer::new(
        ProducerConfig {
            interval_ms: 2000,
            max_ticks: Some(10),
            generator: GeneratorConfig {
                seed: Some(9),
                ..GeneratorConfig::default()
            },
        },
        ctx.queue.clone() as Arc<dyn QueueSender>,
    )
    .unwrap();

    let (_tx, rx) = watch::channel(false);
    producer.run(rx).await;
    assert_eq!(ctx.queue.len(), 10);

    let reports = ctx.drain().await;
    let stored: usize = reports.iter().map(|r| r.stored()).sum();
    let alerts: usize = reports.iter().map(|r| r.alerts_published).sum();
    assert_eq!(stored, 10);
    assert!(ctx.queue.is_empty());

    let records = ctx.stored_records().await;
    assert_eq!(records.len(), 10);
    let expected_alerts = records.iter().filter(|(_, r)| r.price >= 1200.0).count();
    assert_eq!(alerts, expected_alerts);
    assert_eq!(ctx.alerts.count(), expected_alerts);

    for (_, record) in &records {
        assert!(["AAPL", "TSLA", "AMZN", "GOOG", "MSFT"].contains(&record.symbol.as_str()));
        assert!((100.0..=1500.0).contains(&record.price));
        assert!((100..=20_000).contains(&record.volume));
    }
}

/// The consumer loop drains the queue and stops on shutdown.
#[tokio::test(start_paused = true)]
async fn test_consumer_loop_drains_queue() {
    let ctx = Arc::new(TestContext::new());
    for body in fixtures::random_ticks(25, 3) {
        ctx.send(body).await;
    }

    let (tx, rx) = watch::channel(false);
    let runner = ctx.clone();
    let handle = tokio::spawn(async move { runner.worker.run(rx).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(ctx.queue.is_empty());
    assert_eq!(ctx.store.memory().len(), 25);
}

/// POST /ticks → queue → ingestor.
#[tokio::test]
async fn test_http_submission_flows_to_store() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/ticks")
        .json(&serde_json::json!([
            {"symbol": "AAPL", "price": "1500.00", "volume": 500},
            {"symbol": "GOOG"}
        ]))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);

    ctx.drain().await;
    let records = ctx.stored_for("AAPL").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, 1500.0);
    assert_eq!(ctx.alerts.count(), 1);
}
