//! Utility functions for the sink
//!
//! This module provides small platform helpers:
//! - Local host name lookup

pub mod hostname;

// Re-export for convenience
pub use hostname::hostname;
