//! Mock implementations for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use store::{BlobStore, MemoryStore};
use tick_core::{Error, Result};
use worker::AlertSink;

/// Which writes the mock store rejects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailMode {
    #[default]
    Never,
    Always,
    /// Only keys under `processed/{symbol}/`
    Symbol(String),
}

/// Store backed by `MemoryStore` that can be told to fail.
///
/// Implements the same `BlobStore` trait as the ClickHouse store, so the
/// real ingestor runs against it unchanged.
#[derive(Clone)]
pub struct MockStore {
    inner: Arc<MemoryStore>,
    mode: Arc<Mutex<FailMode>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            inner: Arc::new(MemoryStore::new(bucket)),
            mode: Arc::new(Mutex::new(FailMode::Never)),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set failure mode for testing error handling.
    pub fn set_fail_mode(&self, mode: FailMode) {
        *self.mode.lock() = mode;
    }

    /// Every key a write was attempted for, including failed ones.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    /// The backing store with every successful write.
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    fn should_fail(&self, key: &str) -> bool {
        match &*self.mode.lock() {
            FailMode::Never => false,
            FailMode::Always => true,
            FailMode::Symbol(symbol) => key.starts_with(&format!("processed/{}/", symbol)),
        }
    }
}

#[async_trait]
impl BlobStore for MockStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.attempts.lock().push(key.to_string());
        if self.should_fail(key) {
            return Err(Error::store_write(key, "mock store failure"));
        }
        self.inner.put(key, body).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }
}

/// Alert sink that captures published alerts in memory.
#[derive(Clone, Default)]
pub struct RecordingAlertSink {
    published: Arc<Mutex<Vec<(String, String)>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured `(topic, message)` pairs.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::alert_publish(topic, "mock sink failure"));
        }
        self.published
            .lock()
            .push((topic.to_string(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_symbol_failure() {
        let store = MockStore::new("ticks");
        store.set_fail_mode(FailMode::Symbol("TSLA".into()));

        assert!(store.put("processed/TSLA/1.json", b"{}".to_vec()).await.is_err());
        assert!(store.put("processed/AAPL/1.json", b"{}".to_vec()).await.is_ok());
        assert_eq!(store.attempts().len(), 2);
        assert_eq!(store.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_recording_sink_failure_mode() {
        let sink = RecordingAlertSink::new();
        sink.publish("t", "one").await.unwrap();
        sink.set_should_fail(true);
        assert!(sink.publish("t", "two").await.is_err());
        assert_eq!(sink.count(), 1);
    }
}
