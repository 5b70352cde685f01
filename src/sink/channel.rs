//! Channel seams between the routing sink and the storage grid

use crate::core::SinkResult;
use async_trait::async_trait;

/// An open, writable connection to one destination object
#[async_trait]
pub trait Channel: Send {
    /// Write already formatted bytes
    async fn write(&mut self, bytes: &[u8]) -> SinkResult<()>;

    /// Finish the upload; the channel is not written to again afterwards
    async fn close(&mut self) -> SinkResult<()>;
}

/// Opens channels for resolved destination paths
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    async fn open(&self, path: &str) -> SinkResult<Box<dyn Channel>>;
}
