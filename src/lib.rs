//! Tahoe-LAFS log sink
//!
//! Writes streaming log events into files on a Tahoe-LAFS grid through the
//! web gateway's HTTP PUT interface. A destination path may contain escape
//! tags such as `%{host}` or `%Y`, in which case every event is routed to
//! the file its resolved path names.

pub mod core;
pub mod event;
pub mod format;
pub mod sink;
pub mod utils;

pub use crate::core::{SinkConfig, SinkError, SinkResult};
pub use event::{Event, Priority};
pub use format::{FormatFactory, OutputFormat};
pub use sink::{EventSink, TahoeSink};
