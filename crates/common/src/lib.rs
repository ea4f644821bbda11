//! Clipcast Common Utilities
//!
//! Shared infrastructure for all Clipcast crates:
//! - Error types and result aliases
//! - Clock-skew correction for time-bucketed synthesis tokens
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
