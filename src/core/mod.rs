//! Core module containing fundamental types and configurations
//!
//! This module provides the basic building blocks for the sink,
//! including configuration management and error handling.

pub mod config;
pub mod errors;

// Re-export for convenience
pub use config::SinkConfig;
pub use errors::{SinkError, SinkResult};
