//! Log event model
//!
//! An [`Event`] is one log record handed to the sink by the host pipeline.
//! The [`escape`] submodule resolves destination path templates against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod escape;

pub use escape::{contains_tag, escape_string};

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Fatal,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Priority {
    /// Syslog severity code (RFC 5424) for this priority
    pub fn syslog_severity(&self) -> u8 {
        match self {
            Priority::Fatal => 0,
            Priority::Error => 3,
            Priority::Warn => 4,
            Priority::Info => 6,
            Priority::Debug | Priority::Trace => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Fatal => "FATAL",
            Priority::Error => "ERROR",
            Priority::Warn => "WARN",
            Priority::Info => "INFO",
            Priority::Debug => "DEBUG",
            Priority::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub body: String,
    /// Milliseconds since the Unix epoch
    #[serde(default = "now_millis")]
    pub timestamp: i64,
    #[serde(default)]
    pub nanos: i64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "crate::utils::hostname")]
    pub host: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Event {
    /// Create an INFO event stamped with the current time and local host name
    pub fn new<S: Into<String>>(body: S) -> Self {
        let now = Utc::now();
        Self {
            body: body.into(),
            timestamp: now.timestamp_millis(),
            nanos: now.timestamp_nanos_opt().unwrap_or_default(),
            priority: Priority::default(),
            host: crate::utils::hostname(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.timestamp = timestamp_millis;
        self
    }

    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Event timestamp as a UTC date-time, falling back to the epoch when out of range
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}] {}",
            self.host,
            self.priority,
            self.datetime().format("%a %b %d %H:%M:%S UTC %Y"),
            self.body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = Event::new("disk full")
            .with_host("web-1")
            .with_priority(Priority::Error)
            .with_attribute("service", "nginx");

        assert_eq!(event.body, "disk full");
        assert_eq!(event.host, "web-1");
        assert_eq!(event.priority, Priority::Error);
        assert_eq!(event.attribute("service"), Some("nginx"));
        assert_eq!(event.attribute("missing"), None);
    }

    #[test]
    fn test_event_deserialize_fills_defaults() {
        let event: Event = serde_json::from_str(r#"{"body":"hello","host":"a"}"#).unwrap();

        assert_eq!(event.body, "hello");
        assert_eq!(event.host, "a");
        assert_eq!(event.priority, Priority::Info);
        assert!(event.timestamp > 0);
        assert!(event.attributes.is_empty());
    }

    #[test]
    fn test_priority_serializes_uppercase() {
        let json = serde_json::to_string(&Priority::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
        assert_eq!(Priority::Trace.syslog_severity(), 7);
    }

    #[test]
    fn test_event_display() {
        let event = Event::new("up")
            .with_host("db")
            .with_timestamp(0);

        assert_eq!(event.to_string(), "db [INFO Thu Jan 01 00:00:00 UTC 1970] up");
    }
}
