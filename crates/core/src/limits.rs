//! Limits and defaults for the tick pipeline.
//!
//! # Usage Note
//!
//! The size limits are enforced before deserialization so a runaway
//! producer cannot make the ingestor allocate unbounded memory. The
//! defaults mirror the synthetic market the producer simulates.

// === Payload Limits ===

/// Maximum queue message body in bytes (64KB).
///
/// A tick is well under 100 bytes; anything near this limit is not a tick.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Maximum symbol length (chars).
///
/// Exchange tickers are at most a handful of characters; 32 leaves room
/// for suffixed identifiers like "BRK.B" or "ES-2024-12".
pub const MAX_SYMBOL_LEN: usize = 32;

// === Alerting ===

/// Price at or above which an alert is published.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 1200.0;

// === Producer Defaults ===

/// Symbols the producer draws from.
pub const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "TSLA", "AMZN", "GOOG", "MSFT"];

/// Lower bound of the synthetic price range.
pub const DEFAULT_PRICE_MIN: f64 = 100.0;

/// Upper bound of the synthetic price range.
pub const DEFAULT_PRICE_MAX: f64 = 1500.0;

/// Lower bound of the synthetic volume range.
pub const DEFAULT_VOLUME_MIN: u64 = 100;

/// Upper bound of the synthetic volume range.
pub const DEFAULT_VOLUME_MAX: u64 = 20_000;

/// Interval between produced ticks (milliseconds).
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 2000;

// === Redelivery ===

/// Deliveries after which a message is dead-lettered.
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// How long a received message stays hidden before redelivery (milliseconds).
pub const DEFAULT_VISIBILITY_TIMEOUT_MS: u64 = 30_000;
