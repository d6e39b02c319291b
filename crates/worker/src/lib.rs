//! Background workers for the tick pipeline.
//!
//! - Producer (random ticks → queue)
//! - Consumer (queue → ingestor → store, alerts)
//! - Scheduler (task wiring, health checks, metrics log)

pub mod alerts;
pub mod consumer;
pub mod ingestor;
pub mod producer;
pub mod scheduler;

pub use alerts::*;
pub use consumer::*;
pub use ingestor::*;
pub use producer::*;
pub use scheduler::*;
