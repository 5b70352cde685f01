//! Routing sink that writes events into files on a Tahoe-LAFS grid
//!
//! A sink is built from a destination path and an output format. When the
//! path contains escape tags (for example `/logs/%{host}.log`) each event is
//! routed to the file its resolved path names, opening one channel per
//! distinct path on first use. Otherwise every event goes to one channel
//! opened at start.

use crate::core::{SinkConfig, SinkError, SinkResult};
use crate::event::{Event, contains_tag, escape_string};
use crate::format::{FormatFactory, OutputFormat};
use crate::sink::EventSink;
use crate::sink::channel::{Channel, ChannelOpener};
use crate::sink::lafs::LafsChannelOpener;
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Counters for sink activity
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SinkMetrics {
    /// Events formatted and written to a channel
    pub events_written: u64,
    /// Formatted bytes handed to channels
    pub bytes_written: u64,
    /// Channels successfully opened
    pub channels_opened: u64,
    /// Channels successfully closed
    pub channels_closed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Started,
    Stopped,
}

struct SinkState {
    lifecycle: Lifecycle,
    /// Fixed-path channel, opened by start
    writer: Option<Box<dyn Channel>>,
    /// Templated-path channels keyed by resolved path
    writers: HashMap<String, Box<dyn Channel>>,
    metrics: SinkMetrics,
}

/// Sink writing formatted events to one or more grid files
pub struct TahoeSink {
    path: String,
    templated: bool,
    format: Arc<dyn OutputFormat>,
    opener: Arc<dyn ChannelOpener>,
    state: Mutex<SinkState>,
}

impl TahoeSink {
    /// Create a sink; no connection is made until `start` or the first write
    pub fn new(
        path: impl Into<String>,
        format: Arc<dyn OutputFormat>,
        opener: Arc<dyn ChannelOpener>,
    ) -> Self {
        let path = path.into();
        let templated = contains_tag(&path);
        debug!(
            "Created Tahoe sink for {} (templated: {}, format: {})",
            path,
            templated,
            format.name()
        );

        Self {
            path,
            templated,
            format,
            opener,
            state: Mutex::new(SinkState {
                lifecycle: Lifecycle::Created,
                writer: None,
                writers: HashMap::new(),
                metrics: SinkMetrics::default(),
            }),
        }
    }

    /// Build a sink from positional arguments `(path, [format])`
    ///
    /// A missing format selects the configured default. An unknown format
    /// is rejected here rather than on the first write.
    pub fn from_args<S: AsRef<str>>(args: &[S], config: &SinkConfig) -> SinkResult<Self> {
        if args.is_empty() || args.len() > 2 {
            return Err(SinkError::config("usage: tahoe(\"path\"[, \"format\"])"));
        }

        let path = args[0].as_ref();
        if path.is_empty() {
            return Err(SinkError::config("destination path cannot be empty"));
        }

        let format_name = args.get(1).map(|s| s.as_ref());
        let format = FormatFactory::output_format(format_name, &config.default_format)?;
        let opener = LafsChannelOpener::new(config.clone())?;

        Ok(Self::new(path, format, Arc::new(opener)))
    }

    /// Destination path template as given at construction
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether events are routed by resolving the path per event
    pub fn is_templated(&self) -> bool {
        self.templated
    }

    pub fn format_name(&self) -> &'static str {
        self.format.name()
    }

    /// Snapshot of the sink's counters
    pub async fn metrics(&self) -> SinkMetrics {
        self.state.lock().await.metrics.clone()
    }

    /// Resolved paths with an open channel, sorted
    pub async fn open_paths(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut paths: Vec<String> = state.writers.keys().cloned().collect();
        if state.writer.is_some() {
            paths.push(self.path.clone());
        }
        paths.sort();
        paths
    }
}

#[async_trait]
impl EventSink for TahoeSink {
    fn name(&self) -> &'static str {
        "TahoeLAFS"
    }

    async fn start(&self) -> SinkResult<()> {
        let mut state = self.state.lock().await;
        match state.lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Started => return Err(SinkError::lifecycle("sink is already started")),
            Lifecycle::Stopped => {
                return Err(SinkError::lifecycle("sink has been stopped and cannot be restarted"));
            }
        }

        // Templated sinks open channels lazily, one per resolved path
        if !self.templated {
            let channel = self.opener.open(&self.path).await?;
            state.writer = Some(channel);
            state.metrics.channels_opened += 1;
        }

        state.lifecycle = Lifecycle::Started;
        info!("Started {} sink for {}", self.name(), self.path);
        Ok(())
    }

    async fn write(&self, event: &Event) -> SinkResult<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        match state.lifecycle {
            Lifecycle::Started => {}
            Lifecycle::Created => return Err(SinkError::lifecycle("write called before start")),
            Lifecycle::Stopped => return Err(SinkError::lifecycle("write called after stop")),
        }

        let resolved = self.templated.then(|| escape_string(&self.path, event));
        let channel = if let Some(resolved) = &resolved {
            match state.writers.entry(resolved.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    // Nothing is inserted if the open fails, so the next write retries it
                    let channel = self.opener.open(entry.key()).await?;
                    state.metrics.channels_opened += 1;
                    entry.insert(channel)
                }
            }
        } else {
            state
                .writer
                .as_mut()
                .ok_or_else(|| SinkError::lifecycle("fixed channel is not open"))?
        };

        let mut bytes = Vec::new();
        self.format.format(&mut bytes, event).map_err(|e| {
            SinkError::format(format!("{} format failed: {}", self.format.name(), e))
        })?;
        if let Err(e) = channel.write(&bytes).await {
            // A broken upload is dropped so the next write to this path opens a fresh one
            if let Some(resolved) = resolved.as_ref().filter(|_| e.is_connection()) {
                warn!("Dropping failed channel for {}: {}", resolved, e);
                state.writers.remove(resolved);
            }
            return Err(e);
        }

        state.metrics.events_written += 1;
        state.metrics.bytes_written += bytes.len() as u64;
        Ok(())
    }

    async fn stop(&self) -> SinkResult<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        match state.lifecycle {
            Lifecycle::Started => {}
            Lifecycle::Created => {
                state.lifecycle = Lifecycle::Stopped;
                return Ok(());
            }
            Lifecycle::Stopped => {
                debug!("{} sink for {} already stopped", self.name(), self.path);
                return Ok(());
            }
        }
        state.lifecycle = Lifecycle::Stopped;

        let mut channels: Vec<(String, Box<dyn Channel>)> = state.writers.drain().collect();
        channels.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(writer) = state.writer.take() {
            channels.insert(0, (self.path.clone(), writer));
        }

        // Close everything, even after a failure
        let mut failures = Vec::new();
        for (path, mut channel) in channels {
            match channel.close().await {
                Ok(()) => state.metrics.channels_closed += 1,
                Err(e) => {
                    warn!("Failed to close channel for {}: {}", path, e);
                    failures.push((path, e));
                }
            }
        }

        info!(
            "Stopped {} sink for {} ({} events, {} bytes)",
            self.name(),
            self.path,
            state.metrics.events_written,
            state.metrics.bytes_written
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError::CloseFailed { failures })
        }
    }
}
