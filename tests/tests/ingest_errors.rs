//! Failure handling tests for the ingest pipeline.
//!
//! Covers malformed payload isolation, store failures left for redelivery,
//! dead-lettering after repeated failures, and best-effort alerting.

use integration_tests::{
    fixtures,
    mocks::FailMode,
    setup::{TestContext, TestOptions},
};
use std::time::Duration;

/// One malformed message among valid ones: N-1 stores, one report.
#[tokio::test]
async fn test_malformed_message_does_not_abort_batch() {
    let ctx = TestContext::new();
    ctx.send(fixtures::aapl_above_threshold()).await;
    let bad_id = ctx.send(fixtures::goog_missing_price()).await;
    ctx.send(fixtures::tsla_below_threshold()).await;

    let report = ctx.process_batch().await.unwrap();
    assert_eq!(report.received, 3);
    assert_eq!(report.stored(), 2);
    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.malformed[0].message.id, bad_id);
    assert_eq!(report.malformed[0].error.code(), "TICK_001");

    assert!(ctx.stored_for("GOOG").await.is_empty());
    assert_eq!(ctx.store.memory().len(), 2);
    assert_eq!(ctx.alerts.count(), 1);
}

/// Malformed payloads go straight to the dead-letter list.
#[tokio::test]
async fn test_malformed_payloads_are_dead_lettered_immediately() {
    let ctx = TestContext::new();
    let bodies = fixtures::malformed_bodies();
    for body in &bodies {
        ctx.send(body.clone()).await;
    }

    ctx.drain().await;

    assert!(ctx.store.attempts().is_empty(), "no store write for malformed input");
    assert!(ctx.queue.is_empty());

    let dead = ctx.queue.dead_letters();
    assert_eq!(dead.len(), bodies.len());
    assert!(dead.iter().all(|d| d.receive_count == 1));
    assert!(dead.iter().all(|d| d.reason.contains("TICK_001")));
}

/// A numeric string price is accepted as a number.
#[tokio::test]
async fn test_numeric_string_price_accepted() {
    let ctx = TestContext::new();
    ctx.send(r#"{"symbol":"AMZN","price":"1250.50"}"#).await;
    ctx.drain().await;

    let records = ctx.stored_for("AMZN").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].price, 1250.5);
    assert_eq!(records[0].volume, 0);
    assert_eq!(ctx.alerts.count(), 1);
}

/// Store failure: that message stays unacknowledged, the rest are acked.
#[tokio::test(start_paused = true)]
async fn test_store_failure_leaves_message_for_redelivery() {
    let ctx = TestContext::with_options(TestOptions {
        visibility_timeout_ms: 1_000,
        ..TestOptions::default()
    });
    ctx.store.set_fail_mode(FailMode::Symbol("TSLA".into()));

    ctx.send(fixtures::aapl_above_threshold()).await;
    let tsla_id = ctx.send(fixtures::tsla_below_threshold()).await;
    ctx.send(fixtures::tick_json("GOOG", 120.5, 300)).await;

    let report = ctx.process_batch().await.unwrap();
    assert_eq!(report.stored(), 2);
    assert_eq!(report.acked.len(), 2);
    assert_eq!(report.retry_count(), 1);
    assert_eq!(report.store_failures[0].message.id, tsla_id);
    assert_eq!(report.store_failures[0].error.code(), "STORE_001");

    // Only the failed message is left, hidden until its visibility expires.
    assert_eq!(ctx.queue.len(), 1);
    assert_eq!(ctx.queue.in_flight(), 1);
    assert_eq!(ctx.process_batch().await.unwrap().received, 0);

    ctx.store.set_fail_mode(FailMode::Never);
    tokio::time::advance(Duration::from_millis(1_100)).await;

    let retry = ctx.process_batch().await.unwrap();
    assert_eq!(retry.received, 1);
    assert_eq!(retry.stored(), 1);
    assert!(ctx.queue.is_empty());
    assert_eq!(ctx.stored_for("TSLA").await.len(), 1);
    assert!(ctx.queue.dead_letters().is_empty());
}

/// A message that keeps failing is dead-lettered after max receives.
#[tokio::test(start_paused = true)]
async fn test_persistent_store_failure_is_dead_lettered() {
    let ctx = TestContext::with_options(TestOptions {
        visibility_timeout_ms: 1_000,
        max_receive_count: 3,
        ..TestOptions::default()
    });
    ctx.store.set_fail_mode(FailMode::Always);
    let id = ctx.send(fixtures::tick_json("MSFT", 410.25, 50)).await;

    for attempt in 1..=3 {
        let report = ctx.process_batch().await.unwrap();
        assert_eq!(report.received, 1, "delivery {}", attempt);
        assert_eq!(report.retry_count(), 1);
        tokio::time::advance(Duration::from_millis(1_100)).await;
    }

    assert_eq!(ctx.process_batch().await.unwrap().received, 0);
    assert!(ctx.queue.is_empty());
    assert_eq!(ctx.store.attempts().len(), 3);

    let dead = ctx.queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, id);
    assert_eq!(dead[0].receive_count, 3);
}

/// Alert failure is logged, the tick is still stored and acknowledged.
#[tokio::test]
async fn test_alert_failure_still_acknowledges() {
    let ctx = TestContext::new();
    ctx.alerts.set_should_fail(true);
    ctx.send(fixtures::aapl_above_threshold()).await;

    let report = ctx.process_batch().await.unwrap();
    assert_eq!(report.stored(), 1);
    assert_eq!(report.alert_failures, 1);
    assert_eq!(report.alerts_published, 0);

    assert!(ctx.queue.is_empty());
    assert_eq!(ctx.stored_for("AAPL").await.len(), 1);
}
