//! Event sink foundation for the Tahoe-LAFS grid
//! Provides the sink lifecycle trait and the routing sink that writes events to the grid

use crate::core::SinkResult;
use crate::event::Event;
use async_trait::async_trait;

pub mod channel;
pub mod lafs;
pub mod tahoe;

/// EventSink trait for the host pipeline's sink lifecycle
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Human readable sink identifier
    fn name(&self) -> &'static str;

    /// Prepare the sink for writing
    async fn start(&self) -> SinkResult<()>;

    /// Write one event
    async fn write(&self, event: &Event) -> SinkResult<()>;

    /// Close every open output; the sink is not reusable afterwards
    async fn stop(&self) -> SinkResult<()>;
}

pub use channel::{Channel, ChannelOpener};
pub use lafs::{CHUNK_SIZE, LafsChannel, LafsChannelOpener};
pub use tahoe::{SinkMetrics, TahoeSink};
