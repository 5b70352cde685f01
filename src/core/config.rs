//! Configuration management for the Tahoe-LAFS sink
//!
//! This module handles loading configuration from environment variables.
//! It provides a centralized way to manage the gateway settings
//! with proper validation and default values.

use super::{SinkError, SinkResult};
use std::env;

/// Default address of the local Tahoe-LAFS web gateway
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3456";

/// Output format used when the factory is given no format name
pub const DEFAULT_OUTPUT_FORMAT: &str = "raw";

/// Configuration for the sink with validation
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    pub gateway_url: String,
    pub root_cap: Option<String>,
    pub default_format: String,
}

impl SinkConfig {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// Required at channel-open time:
    /// - `TAHOE_ROOTCAP`: root capability of the directory events are written under
    ///
    /// Optional (with defaults):
    /// - `TAHOE_GATEWAY_URL`: web gateway base URL (default: "http://localhost:3456")
    /// - `TAHOE_OUTPUT_FORMAT`: output format when none is named (default: "raw")
    pub fn from_env() -> SinkResult<Self> {
        // The root capability is only checked when a channel is opened
        let root_cap = env::var("TAHOE_ROOTCAP").ok();

        let gateway_url =
            env::var("TAHOE_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let default_format =
            env::var("TAHOE_OUTPUT_FORMAT").unwrap_or_else(|_| DEFAULT_OUTPUT_FORMAT.to_string());

        Self::validate_and_create(gateway_url, root_cap, default_format)
    }

    /// Validate configuration parameters and create SinkConfig
    pub fn validate_and_create(
        gateway_url: String,
        root_cap: Option<String>,
        default_format: String,
    ) -> SinkResult<Self> {
        let gateway_url = gateway_url.trim();
        if gateway_url.is_empty() {
            return Err(SinkError::config("TAHOE_GATEWAY_URL cannot be empty"));
        }

        if !gateway_url.starts_with("http://") && !gateway_url.starts_with("https://") {
            return Err(SinkError::config(
                "TAHOE_GATEWAY_URL must start with http:// or https://",
            ));
        }

        let default_format = default_format.trim();
        if default_format.is_empty() {
            return Err(SinkError::config("TAHOE_OUTPUT_FORMAT cannot be empty"));
        }

        // An empty capability is the same as an unset one
        let root_cap = root_cap
            .map(|cap| cap.trim().to_string())
            .filter(|cap| !cap.is_empty());

        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            root_cap,
            default_format: default_format.to_lowercase(),
        })
    }

    /// Root capability, or a configuration error if it was never set
    pub fn root_cap(&self) -> SinkResult<&str> {
        self.root_cap.as_deref().ok_or_else(|| {
            SinkError::config("please set TAHOE_ROOTCAP to the root capability of the target directory")
        })
    }

    /// Replace the root capability
    pub fn with_root_cap<S: Into<String>>(mut self, root_cap: S) -> Self {
        self.root_cap = Some(root_cap.into());
        self
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            root_cap: None,
            default_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SinkConfig::default();
        assert_eq!(config.gateway_url, "http://localhost:3456");
        assert_eq!(config.default_format, "raw");
        assert!(config.root_cap.is_none());
    }

    #[test]
    fn test_config_missing_root_cap_is_error_on_access() {
        let config = SinkConfig::default();

        let result = config.root_cap();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("TAHOE_ROOTCAP"));
    }

    #[test]
    fn test_config_blank_root_cap_treated_as_missing() {
        let config = SinkConfig::validate_and_create(
            "http://localhost:3456".to_string(),
            Some("   ".to_string()),
            "raw".to_string(),
        )
        .unwrap();

        assert!(config.root_cap().is_err());
    }

    #[test]
    fn test_config_gateway_must_be_http() {
        let result = SinkConfig::validate_and_create(
            "localhost:3456".to_string(),
            None,
            "raw".to_string(),
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().is_configuration());
    }

    #[test]
    fn test_config_normalizes_values() {
        let config = SinkConfig::validate_and_create(
            "https://grid.example.org:3456/".to_string(),
            Some("URI:DIR2:abc:def".to_string()),
            "JSON".to_string(),
        )
        .unwrap();

        assert_eq!(config.gateway_url, "https://grid.example.org:3456");
        assert_eq!(config.root_cap().unwrap(), "URI:DIR2:abc:def");
        assert_eq!(config.default_format, "json");
    }
}
