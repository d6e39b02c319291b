//! In-memory blob store.

use crate::blob::BlobStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tick_core::Result;

/// Blob store backed by a sorted map.
pub struct MemoryStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// All keys, in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Keys starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects.write().insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().get(key).cloned())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryStore::new("ticks");
        store.put("processed/AAPL/1.json", b"{}".to_vec()).await.unwrap();

        assert_eq!(
            store.get("processed/AAPL/1.json").await.unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(store.get("processed/AAPL/2.json").await.unwrap(), None);
        assert_eq!(store.bucket(), "ticks");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new("ticks");
        store.put("k", b"first".to_vec()).await.unwrap();
        store.put("k", b"second".to_vec()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let store = MemoryStore::new("ticks");
        for key in ["processed/AAPL/1.json", "processed/AAPL/2.json", "processed/TSLA/1.json"] {
            store.put(key, Vec::new()).await.unwrap();
        }

        assert_eq!(
            store.keys_with_prefix("processed/AAPL/"),
            vec!["processed/AAPL/1.json", "processed/AAPL/2.json"]
        );
        assert_eq!(store.keys().len(), 3);
    }
}
