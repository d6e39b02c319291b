//! Queue contract and adapters for the tick pipeline.

pub mod config;
pub mod health;
pub mod memory;
pub mod message;
pub mod redpanda;

pub use config::*;
pub use memory::MemoryQueue;
pub use message::*;
pub use redpanda::RedpandaQueue;
