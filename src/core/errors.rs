//! Error types for the Tahoe-LAFS sink
//! Provides structured error handling using thiserror for better error reporting

use thiserror::Error;

/// Main error type for the sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Gateway connection or transfer failure
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation not valid in the sink's current lifecycle state
    #[error("Lifecycle error: {message}")]
    Lifecycle { message: String },

    /// Output formatting errors
    #[error("Format error: {message}")]
    Format { message: String },

    /// One or more channels failed to close during stop
    #[error("{} channel(s) failed to close; first: {}", .failures.len(), first_failure(.failures))]
    CloseFailed { failures: Vec<(String, SinkError)> },

    /// Network/IO related errors
    #[error("Network IO error")]
    NetworkIO(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type SinkResult<T> = std::result::Result<T, SinkError>;

fn first_failure(failures: &[(String, SinkError)]) -> String {
    match failures.first() {
        Some((path, err)) => format!("{}: {}", path, err),
        None => "none".to_string(),
    }
}

impl SinkError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error without an underlying cause
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping its cause
    pub fn connection_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a lifecycle error
    pub fn lifecycle<S: Into<String>>(message: S) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle { .. })
    }
}
