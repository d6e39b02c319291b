//! Core types, validation, and errors for the tick pipeline.

pub mod error;
pub mod generator;
pub mod key;
pub mod limits;
pub mod tick;

pub use error::{Error, Result};
pub use generator::*;
pub use key::*;
pub use tick::*;
