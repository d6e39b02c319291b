//! Test fixtures and tick generators.

use tick_core::{GeneratorConfig, TickGenerator};

/// Tick JSON body as the producer would send it.
pub fn tick_json(symbol: &str, price: f64, volume: u64) -> String {
    serde_json::json!({
        "symbol": symbol,
        "price": price,
        "volume": volume
    })
    .to_string()
}

/// AAPL at 1500.00: above the default threshold.
pub fn aapl_above_threshold() -> String {
    r#"{"symbol":"AAPL","price":1500.00,"volume":500}"#.to_string()
}

/// TSLA at 999.99: below the default threshold.
pub fn tsla_below_threshold() -> String {
    r#"{"symbol":"TSLA","price":999.99,"volume":100}"#.to_string()
}

/// GOOG without a price.
pub fn goog_missing_price() -> String {
    r#"{"symbol":"GOOG"}"#.to_string()
}

/// Bodies that must never reach the store.
pub fn malformed_bodies() -> Vec<String> {
    vec![
        "not json".to_string(),
        "[]".to_string(),
        goog_missing_price(),
        r#"{"symbol":"AMZN","price":-5.0,"volume":10}"#.to_string(),
        r#"{"symbol":"AMZN","price":0,"volume":10}"#.to_string(),
        r#"{"symbol":"../../etc","price":10.0,"volume":10}"#.to_string(),
        r#"{"symbol":"","price":10.0,"volume":10}"#.to_string(),
        r#"{"symbol":"MSFT","price":10.0,"volume":-1}"#.to_string(),
        oversized_body(),
    ]
}

/// A tick body over the 64 KiB message limit.
pub fn oversized_body() -> String {
    serde_json::json!({
        "symbol": "AAPL",
        "price": 100.0,
        "volume": 1,
        "padding": "x".repeat(70_000)
    })
    .to_string()
}

/// Deterministic generator over the default symbols and ranges.
pub fn seeded_generator(seed: u64) -> TickGenerator {
    TickGenerator::new(GeneratorConfig {
        seed: Some(seed),
        ..GeneratorConfig::default()
    })
    .expect("default generator config is valid")
}

/// N valid tick bodies from a seeded generator.
pub fn random_ticks(n: usize, seed: u64) -> Vec<String> {
    let mut generator = seeded_generator(seed);
    (0..n)
        .map(|_| {
            generator
                .generate()
                .to_json()
                .expect("generated ticks serialize")
        })
        .collect()
}
