//! Telemetry for the tick pipeline.
//!
//! Metrics and health live in process and are served by the HTTP
//! surface in the `api` crate; logs go through `tracing`.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
