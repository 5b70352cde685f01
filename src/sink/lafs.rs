//! Tahoe-LAFS web gateway channels
//!
//! Each channel is one `PUT <gateway>/uri/<rootcap><path>` request whose body
//! is streamed with chunked transfer encoding. Written bytes are buffered
//! until a full chunk is available, then handed to the request task.

use crate::core::{SinkConfig, SinkError, SinkResult};
use crate::sink::channel::{Channel, ChannelOpener};
use async_trait::async_trait;
use reqwest::{Body, Client, Response, Url};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Size of each body chunk sent to the gateway
pub const CHUNK_SIZE: usize = 64_000_000;

/// Opens PUT channels against the configured gateway
pub struct LafsChannelOpener {
    config: SinkConfig,
    client: Client,
    chunk_size: usize,
}

impl LafsChannelOpener {
    /// Create a new opener with a dedicated HTTP client
    pub fn new(config: SinkConfig) -> SinkResult<Self> {
        // The gateway is a local daemon, never reached through a proxy
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| SinkError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            chunk_size: CHUNK_SIZE,
        })
    }

    /// Override the body chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Target URL for a resolved path
    ///
    /// The path is appended as-is. Names are not URL-encoded and the target
    /// is overwritten if it already exists.
    pub fn target_url(&self, path: &str) -> SinkResult<String> {
        let root_cap = self.config.root_cap()?;
        Ok(format!("{}/uri/{}{}", self.config.gateway_url, root_cap, path))
    }
}

#[async_trait]
impl ChannelOpener for LafsChannelOpener {
    async fn open(&self, path: &str) -> SinkResult<Box<dyn Channel>> {
        let target = self.target_url(path)?;
        let url = Url::parse(&target).map_err(|e| {
            SinkError::connection_with_source(format!("invalid target URL for {}", path), e)
        })?;

        info!("Opening LAFS channel for {}", path);

        let (sender, mut receiver) = mpsc::channel::<Vec<u8>>(1);
        // The body is first polled once the connection is up and the request head is sent
        let (connected_tx, mut connected_rx) = oneshot::channel::<()>();
        let mut connected_tx = Some(connected_tx);
        let stream = futures_util::stream::poll_fn(move |cx| {
            if let Some(tx) = connected_tx.take() {
                let _ = tx.send(());
            }
            receiver
                .poll_recv(cx)
                .map(|chunk| chunk.map(Ok::<_, std::io::Error>))
        });

        let request = self.client.put(url).body(Body::wrap_stream(stream)).send();
        let mut response = tokio::spawn(request);

        tokio::select! {
            connected = &mut connected_rx => {
                // A dropped signal means the request ended before its body was polled
                if connected.is_err() {
                    return Err(early_failure(path, response.await));
                }
            }
            finished = &mut response => return Err(early_failure(path, finished)),
        }
        debug!("Connected to gateway for {}", path);

        Ok(Box::new(LafsChannel {
            path: path.to_string(),
            chunk_size: self.chunk_size,
            buffer: Vec::new(),
            sender: Some(sender),
            response: Some(response),
            failed: false,
        }))
    }
}

/// Error for a request that finished before its upload began
fn early_failure(
    path: &str,
    finished: Result<reqwest::Result<Response>, JoinError>,
) -> SinkError {
    match finished {
        Ok(Ok(resp)) => SinkError::connection(format!(
            "gateway answered {} with status {} before the upload began",
            path,
            resp.status()
        )),
        Ok(Err(e)) => {
            SinkError::connection_with_source(format!("PUT request for {} failed", path), e)
        }
        Err(e) => {
            SinkError::connection_with_source(format!("PUT request task for {} failed", path), e)
        }
    }
}

/// A streaming PUT upload of one file
pub struct LafsChannel {
    path: String,
    chunk_size: usize,
    buffer: Vec<u8>,
    sender: Option<mpsc::Sender<Vec<u8>>>,
    response: Option<JoinHandle<reqwest::Result<Response>>>,
    failed: bool,
}

impl LafsChannel {
    async fn send_chunk(&mut self, chunk: Vec<u8>) -> SinkResult<()> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(SinkError::connection(format!(
                "channel for {} is no longer writable",
                self.path
            )));
        };

        if sender.send(chunk).await.is_err() {
            // The request finished before the body did
            let err = match self.finish().await {
                Err(e) => e,
                Ok(()) => SinkError::connection(format!(
                    "gateway ended the upload of {} before the body was complete",
                    self.path
                )),
            };
            self.failed = true;
            return Err(err);
        }

        Ok(())
    }

    /// End the request body and wait for the gateway's response
    async fn finish(&mut self) -> SinkResult<()> {
        self.sender = None;
        let Some(response) = self.response.take() else {
            return Ok(());
        };

        match response.await {
            Ok(Ok(resp)) => {
                let status = resp.status();
                if status.is_success() {
                    debug!("Upload of {} completed: {}", self.path, status);
                } else {
                    warn!("Gateway answered upload of {} with status {}", self.path, status);
                }
                Ok(())
            }
            Ok(Err(e)) => {
                self.failed = true;
                Err(SinkError::connection_with_source(
                    format!("PUT request for {} failed", self.path),
                    e,
                ))
            }
            Err(e) => {
                self.failed = true;
                Err(SinkError::connection_with_source(
                    format!("PUT request task for {} failed", self.path),
                    e,
                ))
            }
        }
    }
}

#[async_trait]
impl Channel for LafsChannel {
    async fn write(&mut self, bytes: &[u8]) -> SinkResult<()> {
        if self.failed || self.sender.is_none() {
            return Err(SinkError::connection(format!(
                "channel for {} is no longer writable",
                self.path
            )));
        }

        self.buffer.extend_from_slice(bytes);
        while self.buffer.len() >= self.chunk_size {
            let rest = self.buffer.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            self.send_chunk(chunk).await?;
        }

        Ok(())
    }

    async fn close(&mut self) -> SinkResult<()> {
        if self.failed {
            return Err(SinkError::connection(format!(
                "upload of {} failed earlier",
                self.path
            )));
        }
        if self.response.is_none() {
            return Ok(());
        }

        if !self.buffer.is_empty() {
            let chunk = std::mem::take(&mut self.buffer);
            self.send_chunk(chunk).await?;
        }

        debug!("Closing LAFS channel for {}", self.path);
        self.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one request, answer 200 and hand back the raw request bytes
    async fn spawn_gateway() -> (String, oneshot::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.ends_with(b"0\r\n\r\n") {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            let _ = tx.send(request);
        });

        (format!("http://{}", addr), rx)
    }

    /// Split a raw request into its head and decoded chunk payloads
    fn split_chunked(request: &[u8]) -> (String, Vec<Vec<u8>>) {
        let head_end = request
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap();
        let head = String::from_utf8(request[..head_end].to_vec()).unwrap();

        let mut chunks = Vec::new();
        let mut rest = &request[head_end + 4..];
        loop {
            let line_end = rest.windows(2).position(|w| w == b"\r\n").unwrap();
            let size_line = std::str::from_utf8(&rest[..line_end]).unwrap();
            let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
            rest = &rest[line_end + 2..];
            if size == 0 {
                break;
            }
            chunks.push(rest[..size].to_vec());
            rest = &rest[size + 2..];
        }

        (head, chunks)
    }

    fn config(gateway_url: &str) -> SinkConfig {
        SinkConfig::validate_and_create(gateway_url.to_string(), None, "raw".to_string())
            .unwrap()
            .with_root_cap("URI:DIR2:abc:xyz")
    }

    /// Address of a local port with nothing listening on it
    fn closed_gateway() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_target_url_concatenates_without_encoding() {
        let opener = LafsChannelOpener::new(config("http://localhost:3456")).unwrap();
        assert_eq!(
            opener.target_url("/logs/a b.log").unwrap(),
            "http://localhost:3456/uri/URI:DIR2:abc:xyz/logs/a b.log"
        );
    }

    #[tokio::test]
    async fn test_open_without_root_cap_fails_before_network() {
        let opener = LafsChannelOpener::new(SinkConfig::default()).unwrap();

        let err = opener.open("/logs/all.log").await.err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_put_streams_chunked_body() {
        let (gateway, request) = spawn_gateway().await;
        let opener = LafsChannelOpener::new(config(&gateway))
            .unwrap()
            .with_chunk_size(8);

        let mut channel = opener.open("/logs/all.log").await.unwrap();
        channel.write(b"first line\n").await.unwrap();
        channel.write(b"second\n").await.unwrap();
        channel.close().await.unwrap();

        let request = request.await.unwrap();
        let (head, chunks) = split_chunked(&request);

        assert!(head.starts_with("PUT /uri/URI:DIR2:abc:xyz/logs/all.log HTTP/1.1"));
        assert!(head.to_lowercase().contains("transfer-encoding: chunked"));
        assert!(chunks.iter().all(|c| c.len() <= 8));
        assert_eq!(chunks.concat(), b"first line\nsecond\n");
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let (gateway, request) = spawn_gateway().await;
        let opener = LafsChannelOpener::new(config(&gateway)).unwrap();

        let mut channel = opener.open("/logs/once.log").await.unwrap();
        channel.write(b"only\n").await.unwrap();
        channel.close().await.unwrap();
        channel.close().await.unwrap();

        let (_, chunks) = split_chunked(&request.await.unwrap());
        assert_eq!(chunks.concat(), b"only\n");
    }

    #[tokio::test]
    async fn test_open_fails_when_gateway_is_unreachable() {
        let opener = LafsChannelOpener::new(config(&closed_gateway()))
            .unwrap()
            .with_chunk_size(1);

        let err = opener.open("/logs/x.log").await.err().unwrap();
        assert!(err.is_connection());
        assert!(err.to_string().contains("/logs/x.log"));

        // Every attempt connects again and fails the same way
        let err = opener.open("/logs/x.log").await.err().unwrap();
        assert!(err.is_connection());
    }
}
