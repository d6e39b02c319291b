//! The durable store contract.

use async_trait::async_trait;
use tick_core::Result;

/// Keyed blob storage for processed ticks.
///
/// A store is bound to one bucket at construction; keys are relative to it.
/// Writing an existing key replaces its body.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `body` under `key`.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Reads the latest body written under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Bucket this store writes to.
    fn bucket(&self) -> &str;

    /// Checks if the store is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
