//! Core types and foundations
//!
//! The value graph, error handling, and configuration shared by the encoder
//! and the decoder.

pub mod types;
pub mod error;
pub mod config;

// Re-export commonly used items
pub use types::{Host, HostObject, Pattern, Record, Shared, Tagged, Value};
pub use error::{Error, Result};
pub use config::{Config, Limits, LoggingConfig};
