//! Tick submission endpoint.
//!
//! Accepts ticks in 2 formats:
//! 1. Single tick: `{ "symbol": "AAPL", "price": 1500.0, "volume": 500 }`
//! 2. Array: `[tick, tick, ...]`
//!
//! Every tick passes the same validation the ingestor applies, then goes
//! onto the queue in canonical JSON.

use axum::{body::Bytes, extract::State, Json};
use std::time::Instant;
use telemetry::metrics;
use tick_core::Tick;
use tracing::{debug, error, info, warn};

use crate::response::{ApiError, SubmitResponse};
use crate::state::AppState;

/// Most ticks accepted in one request.
pub const MAX_SUBMIT_TICKS: usize = 100;

/// POST /ticks - Enqueue ticks for ingestion.
///
/// Ticks are sent in order. When a send fails the response is 503 and
/// `message_ids` lists the ticks that were enqueued before it.
pub async fn submit_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let start = Instant::now();

    let Some(queue) = state.queue.clone() else {
        return Err(ApiError::unavailable(
            "QUEUE_001",
            format!("tick submission is not enabled for role {}", state.role),
        ));
    };

    let items = split_payload(&body)?;
    if items.len() > MAX_SUBMIT_TICKS {
        return Err(ApiError::validation(vec![format!(
            "request has {} ticks, exceeds {} limit",
            items.len(),
            MAX_SUBMIT_TICKS
        )]));
    }

    debug!(count = items.len(), payload_size = body.len(), "Received tick submission");

    let mut ticks = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match parse_item(item) {
            Ok(tick) => ticks.push(tick),
            Err(e) => errors.push(format!("tick {}: {}", index, e)),
        }
    }

    if ticks.is_empty() {
        warn!(rejected = errors.len(), "Rejected tick submission");
        return Err(ApiError::validation(errors));
    }

    let mut message_ids = Vec::with_capacity(ticks.len());
    for tick in &ticks {
        let body = tick.to_json()?;
        match queue.send(body).await {
            Ok(id) => {
                metrics().ticks_produced.inc();
                message_ids.push(id);
            }
            Err(e) => {
                metrics().queue_send_errors.inc();
                error!(
                    sent = message_ids.len(),
                    symbol = %tick.symbol,
                    error = %e,
                    "Failed to enqueue submitted tick"
                );
                return Err(ApiError::from(e).with_enqueued(message_ids));
            }
        }
    }

    info!(
        accepted = message_ids.len(),
        rejected = errors.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Ticks enqueued"
    );

    Ok(Json(SubmitResponse::new(message_ids, errors)))
}

fn split_payload(body: &[u8]) -> Result<Vec<serde_json::Value>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON: {}", e)))?;

    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(_) => Ok(vec![value]),
        _ => Err(ApiError::bad_request(
            "expected a tick object or an array of ticks",
        )),
    }
}

fn parse_item(item: &serde_json::Value) -> tick_core::Result<Tick> {
    let bytes = serde_json::to_vec(item)?;
    Tick::parse(&bytes)
}
