//! Output formats for log events
//! Converts events into the bytes written to a storage channel

use crate::core::{SinkError, SinkResult};
use crate::event::Event;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::error;

/// Output format trait for serializing one event onto an output stream
pub trait OutputFormat: Send + Sync {
    /// Name the format is registered under
    fn name(&self) -> &'static str;

    /// Write one formatted event to `out`
    fn format(&self, out: &mut dyn Write, event: &Event) -> io::Result<()>;
}

/// Body only, newline terminated
#[derive(Debug, Default, Clone, Copy)]
pub struct RawOutputFormat;

impl OutputFormat for RawOutputFormat {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn format(&self, out: &mut dyn Write, event: &Event) -> io::Result<()> {
        out.write_all(event.body.as_bytes())?;
        out.write_all(b"\n")
    }
}

/// One JSON object per line
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonOutputFormat;

#[derive(Serialize)]
struct JsonRecord<'a> {
    body: &'a str,
    timestamp: i64,
    pri: &'static str,
    nanos: i64,
    host: &'a str,
    fields: &'a BTreeMap<String, String>,
}

impl OutputFormat for JsonOutputFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn format(&self, out: &mut dyn Write, event: &Event) -> io::Result<()> {
        let record = JsonRecord {
            body: &event.body,
            timestamp: event.timestamp,
            pri: event.priority.as_str(),
            nanos: event.nanos,
            host: &event.host,
            fields: &event.attributes,
        };
        serde_json::to_writer(&mut *out, &record)?;
        out.write_all(b"\n")
    }
}

/// BSD syslog style line with the user facility
#[derive(Debug, Default, Clone, Copy)]
pub struct SyslogOutputFormat;

const SYSLOG_FACILITY_USER: u8 = 1;

impl OutputFormat for SyslogOutputFormat {
    fn name(&self) -> &'static str {
        "syslog"
    }

    fn format(&self, out: &mut dyn Write, event: &Event) -> io::Result<()> {
        let pri = SYSLOG_FACILITY_USER * 8 + event.priority.syslog_severity();
        writeln!(
            out,
            "<{}>{} {} {}",
            pri,
            event.datetime().format("%b %e %H:%M:%S"),
            event.host,
            event.body
        )
    }
}

/// log4j-like layout: date, priority, host and message
#[derive(Debug, Default, Clone, Copy)]
pub struct Log4jOutputFormat;

impl OutputFormat for Log4jOutputFormat {
    fn name(&self) -> &'static str {
        "log4j"
    }

    fn format(&self, out: &mut dyn Write, event: &Event) -> io::Result<()> {
        writeln!(
            out,
            "{} {} {}: {}",
            event.datetime().format("%Y-%m-%d %H:%M:%S,%3f"),
            event.priority,
            event.host,
            event.body
        )
    }
}

/// The event's display form, for eyeballing
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugOutputFormat;

impl OutputFormat for DebugOutputFormat {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn format(&self, out: &mut dyn Write, event: &Event) -> io::Result<()> {
        writeln!(out, "{}", event)
    }
}

/// Resolves output format names to shared format instances
pub struct FormatFactory;

impl FormatFactory {
    /// Names accepted by [`FormatFactory::output_format`]
    pub const NAMES: [&'static str; 5] = ["raw", "json", "syslog", "log4j", "debug"];

    /// Look up a format by name, or `default` when no name is given
    pub fn output_format(name: Option<&str>, default: &str) -> SinkResult<Arc<dyn OutputFormat>> {
        let name = name.unwrap_or(default);
        let format: Arc<dyn OutputFormat> = match name.trim().to_lowercase().as_str() {
            "raw" => Arc::new(RawOutputFormat),
            "json" => Arc::new(JsonOutputFormat),
            "syslog" => Arc::new(SyslogOutputFormat),
            "log4j" => Arc::new(Log4jOutputFormat),
            "debug" => Arc::new(DebugOutputFormat),
            _ => {
                error!("failed to load format {}", name);
                return Err(SinkError::config(format!(
                    "failed to load format '{}', expected one of: {}",
                    name,
                    Self::NAMES.join(", ")
                )));
            }
        };
        Ok(format)
    }
}
