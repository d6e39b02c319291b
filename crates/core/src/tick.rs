//! Tick payloads and the enriched records written to the store.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{Error, Result};
use crate::limits::{MAX_MESSAGE_BYTES, MAX_SYMBOL_LEN};

/// Format of `processed_at` on stored records.
pub const PROCESSED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single market-data tick as it travels over the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Tick {
    #[validate(custom(function = "validate_symbol"))]
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_price")]
    #[validate(custom(function = "validate_price"))]
    pub price: f64,
    #[serde(default)]
    pub volume: u64,
}

/// Symbols end up as a path segment of the storage key, so only
/// `[A-Za-z0-9._-]` is allowed.
fn validate_symbol(symbol: &str) -> std::result::Result<(), ValidationError> {
    if symbol.is_empty() || symbol.chars().count() > MAX_SYMBOL_LEN {
        let mut err = ValidationError::new("symbol_length");
        err.message = Some(format!("symbol must be 1-{} chars", MAX_SYMBOL_LEN).into());
        return Err(err);
    }

    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid || symbol.starts_with('.') {
        let mut err = ValidationError::new("symbol_charset");
        err.message = Some(format!("symbol {:?} contains invalid characters", symbol).into());
        return Err(err);
    }
    Ok(())
}

fn validate_price(price: f64) -> std::result::Result<(), ValidationError> {
    if !price.is_finite() || price <= 0.0 {
        let mut err = ValidationError::new("price_not_positive");
        err.message = Some(format!("price must be a positive number, got {}", price).into());
        return Err(err);
    }
    Ok(())
}

/// Accepts JSON numbers and numeric strings ("1500.00").
fn deserialize_price<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("price is not representable as a float")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("price {:?} is not numeric", s))),
        other => Err(D::Error::custom(format!(
            "price must be numeric, got {}",
            other
        ))),
    }
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, volume: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume,
        }
    }

    /// Parses and validates a raw queue message body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() > MAX_MESSAGE_BYTES {
            return Err(Error::malformed(format!(
                "message {}KB exceeds {}KB limit",
                body.len() / 1024,
                MAX_MESSAGE_BYTES / 1024
            )));
        }

        let tick: Tick =
            serde_json::from_slice(body).map_err(|e| Error::malformed(e.to_string()))?;
        tick.validate()
            .map_err(|e| Error::malformed(flatten_errors(&e)))?;
        Ok(tick)
    }

    /// Canonical JSON encoding used on the queue.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Stamps the tick with its processing time.
    pub fn enrich(self, processed_at: DateTime<Utc>) -> ProcessedTick {
        ProcessedTick {
            symbol: self.symbol,
            price: self.price,
            volume: self.volume,
            processed_at: processed_at.format(PROCESSED_AT_FORMAT).to_string(),
        }
    }
}

/// A tick after ingestion: the original fields plus `processed_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTick {
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
    pub processed_at: String,
}

impl ProcessedTick {
    /// Parses `processed_at` back into a timestamp.
    pub fn processed_at_time(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.processed_at, PROCESSED_AT_FORMAT).map_err(|e| {
            Error::malformed(format!(
                "processed_at {:?} is not a valid timestamp: {}",
                self.processed_at, e
            ))
        })
    }

    /// The tick this record was built from.
    pub fn tick(&self) -> Tick {
        Tick::new(self.symbol.clone(), self.price, self.volume)
    }

    /// JSON body written to the store.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::malformed(e.to_string()))
    }
}

fn flatten_errors(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{}: {}", field, msg),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
