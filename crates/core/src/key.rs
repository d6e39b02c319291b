//! Storage key derivation for processed ticks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix shared by every processed tick key.
pub const PROCESSED_PREFIX: &str = "processed";

/// How a processed tick's storage key is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// `processed/{symbol}/{unix_seconds}.json`
    ///
    /// Two ticks for one symbol in the same second share a key and the
    /// later write wins.
    #[default]
    Seconds,
    /// `processed/{symbol}/{unix_seconds}-{message_id}.json`
    ///
    /// Unique per queue message, so the store stays append-only.
    MessageId,
}

impl KeyScheme {
    /// Builds the storage key for a tick processed at `at`.
    pub fn key(&self, symbol: &str, at: DateTime<Utc>, message_id: &str) -> String {
        let secs = at.timestamp();
        match self {
            Self::Seconds => format!("{}/{}/{}.json", PROCESSED_PREFIX, symbol, secs),
            Self::MessageId => format!(
                "{}/{}/{}-{}.json",
                PROCESSED_PREFIX,
                symbol,
                secs,
                sanitize_id(message_id)
            ),
        }
    }
}

/// Queue-assigned ids are opaque; keep them from adding path segments.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
