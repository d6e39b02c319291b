//! ClickHouse table schemas.
//!
//! Processed ticks are stored as opaque JSON blobs keyed by
//! `(bucket, key)`. `ReplacingMergeTree(written_at)` keeps the newest body
//! per key after merges, and reads use `FINAL`, so a re-put of a key
//! behaves like an object-store overwrite.

/// Table holding processed tick blobs.
pub const PROCESSED_TICKS_TABLE: &str = "processed_ticks";

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// SQL for creating the processed ticks table.
pub fn create_processed_ticks_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{table} (
    bucket LowCardinality(String),
    key String,
    body String,
    written_at DateTime64(3)
)
ENGINE = ReplacingMergeTree(written_at)
ORDER BY (bucket, key)
SETTINGS index_granularity = 8192
"#,
        database = database,
        table = PROCESSED_TICKS_TABLE
    )
}

/// All DDL statements in execution order.
pub fn all_statements(database: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_processed_ticks_table(database),
    ]
}
