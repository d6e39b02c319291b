//! Durable blob store for processed ticks.

pub mod blob;
pub mod client;
pub mod clickhouse_store;
pub mod config;
pub mod memory;
pub mod schema;

pub use blob::BlobStore;
pub use client::ClickHouseClient;
pub use clickhouse_store::ClickHouseStore;
pub use config::*;
pub use memory::MemoryStore;
