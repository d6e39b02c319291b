//! ClickHouse-backed blob store.

use crate::blob::BlobStore;
use crate::client::ClickHouseClient;
use async_trait::async_trait;
use chrono::Utc;
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use telemetry::metrics;
use tick_core::{Error, Result};
use tracing::debug;

/// One stored blob.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct BlobRow {
    pub bucket: String,
    pub key: String,
    pub body: String,
    pub written_at: i64, // milliseconds since epoch
}

/// Blob store writing to `{database}.processed_ticks`.
pub struct ClickHouseStore {
    client: ClickHouseClient,
    bucket: String,
    table: String,
    timeout: Duration,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient, bucket: impl Into<String>) -> Self {
        let table = client.table();
        let timeout = client.timeout();
        Self {
            client,
            bucket: bucket.into(),
            table,
            timeout,
        }
    }

    async fn insert_row(&self, row: &BlobRow) -> std::result::Result<(), String> {
        let mut insert = self
            .client
            .inner()
            .insert(&self.table)
            .map_err(|e| format!("Insert error: {}", e))?;
        insert
            .write(row)
            .await
            .map_err(|e| format!("Write error: {}", e))?;
        insert.end().await.map_err(|e| format!("End error: {}", e))
    }
}

#[async_trait]
impl BlobStore for ClickHouseStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let body = String::from_utf8(body)
            .map_err(|e| Error::store_write(key, format!("body is not UTF-8: {}", e)))?;
        let row = BlobRow {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            body,
            written_at: Utc::now().timestamp_millis(),
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.insert_row(&row)).await;
        metrics()
            .store_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match outcome {
            Ok(Ok(())) => {
                debug!(bucket = %self.bucket, key = key, "Stored blob");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::store_write(key, e)),
            Err(_) => Err(Error::store_write(
                key,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let sql = format!(
            "SELECT bucket, key, body, written_at FROM {} FINAL WHERE bucket = ? AND key = ? LIMIT 1",
            self.table
        );
        let rows: Vec<BlobRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(&self.bucket)
            .bind(key)
            .fetch_all()
            .await
            .map_err(|e| Error::internal(format!("Query error: {}", e)))?;

        Ok(rows.into_iter().next().map(|row| row.body.into_bytes()))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn health_check(&self) -> bool {
        self.client.ping().await
    }
}
