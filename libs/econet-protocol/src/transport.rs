//! TCP transport to the ecoNET module
//!
//! `TcpTransport` owns one socket and its receive buffer. `TcpLink` is the
//! device-level handle: every transaction opens a fresh connection, sends one
//! request, waits for the matching response and closes, with a request lock
//! keeping a single transaction in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::hex::format_hex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Instant};
use tracing::{debug, trace, warn};

use crate::constants::{DEFAULT_PORT, RECV_CHUNK_SIZE};
use crate::error::{ProtocolError, Result};
use crate::frame::Frame;
use crate::reassembler::Reassembler;

/// One request/response exchange with the device
///
/// `Ok(None)` means no matching response before the deadline; `Err` means
/// the connection itself failed.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn transact(&self, request: &Frame, deadline: Duration) -> Result<Option<Frame>>;
}

/// TCP endpoint of the ecoNET module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTransportConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl TcpTransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ProtocolError::config("Host cannot be empty"));
        }
        if self.port == 0 {
            return Err(ProtocolError::config("Port cannot be zero"));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Transport counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub transactions: u64,
    pub responses: u64,
    pub timeouts: u64,
    pub connection_failures: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Frames skipped because their function code did not match
    pub unexpected_frames: u64,
}

/// Single TCP connection with frame reassembly
#[derive(Debug)]
pub struct TcpTransport {
    config: TcpTransportConfig,
    stream: Option<TcpStream>,
    reassembler: Reassembler,
    pending: VecDeque<Frame>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            stream: None,
            reassembler: Reassembler::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the socket, bounded by `limit`
    pub async fn connect(&mut self, limit: Duration) -> Result<()> {
        let addr = self.config.socket_addr();
        trace!("Connecting to {}", addr);

        match timeout(limit, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("TCP_NODELAY failed: {}", e);
                }
                self.stream = Some(stream);
                Ok(())
            },
            Ok(Err(e)) => Err(ProtocolError::connection(addr, e.to_string())),
            Err(_) => Err(ProtocolError::timeout(format!(
                "connect to {} after {:?}",
                addr, limit
            ))),
        }
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                trace!("TCP shutdown: {}", e);
            }
        }
        self.reassembler.clear();
        self.pending.clear();
    }

    /// Serialize and write one frame; resets the receive buffer
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<usize> {
        let bytes = frame.encode()?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProtocolError::connection(self.config.socket_addr(), "not connected"))?;

        self.reassembler.clear();
        self.pending.clear();

        debug!("TX {}B: {}", bytes.len(), format_hex(&bytes));
        if let Err(e) = stream.write_all(&bytes).await {
            self.stream = None;
            return Err(ProtocolError::connection(
                self.config.socket_addr(),
                format!("send failed: {}", e),
            ));
        }
        Ok(bytes.len())
    }

    /// Wait for the next complete frame
    ///
    /// `Ok(None)` on deadline or peer close, `Err` on socket errors.
    pub async fn read_frame(&mut self, limit: Duration) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }

        let deadline = Instant::now() + limit;
        let mut chunk = [0u8; RECV_CHUNK_SIZE];

        loop {
            let stream = self.stream.as_mut().ok_or_else(|| {
                ProtocolError::connection(self.config.socket_addr(), "not connected")
            })?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let n = match timeout(remaining, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    debug!("Peer closed before a frame arrived");
                    self.stream = None;
                    return Ok(None);
                },
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    self.stream = None;
                    return Err(ProtocolError::connection(
                        self.config.socket_addr(),
                        format!("receive failed: {}", e),
                    ));
                },
                Err(_) => return Ok(None),
            };

            debug!("RX {}B: {}", n, format_hex(&chunk[..n]));
            self.pending.extend(self.reassembler.push(&chunk[..n]));
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
        }
    }
}

/// Device handle: one short-lived connection per transaction
#[derive(Debug)]
pub struct TcpLink {
    config: TcpTransportConfig,
    request_lock: Mutex<()>,
    stats: Arc<RwLock<TransportStats>>,
}

impl TcpLink {
    pub fn new(config: TcpTransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            request_lock: Mutex::new(()),
            stats: Arc::new(RwLock::new(TransportStats::default())),
        })
    }

    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }

    pub async fn stats(&self) -> TransportStats {
        self.stats.read().await.clone()
    }

    async fn exchange(
        &self,
        transport: &mut TcpTransport,
        request: &Frame,
        limit: Duration,
    ) -> Result<Option<Frame>> {
        let deadline = Instant::now() + limit;

        transport.connect(limit).await?;
        let sent = transport.send_frame(request).await?;
        self.stats.write().await.bytes_sent += sent as u64;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match transport.read_frame(remaining).await? {
                Some(frame) if frame.is_response_to(request.func) => return Ok(Some(frame)),
                Some(frame) => {
                    debug!(
                        "Skipping frame func 0x{:02X}, waiting for 0x{:02X}",
                        frame.func,
                        Frame::response_function(request.func)
                    );
                    self.stats.write().await.unexpected_frames += 1;
                },
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl Transaction for TcpLink {
    async fn transact(&self, request: &Frame, deadline: Duration) -> Result<Option<Frame>> {
        let _guard = self.request_lock.lock().await;

        let mut transport = TcpTransport::new(self.config.clone());
        let result = self.exchange(&mut transport, request, deadline).await;
        transport.close().await;

        let mut stats = self.stats.write().await;
        stats.transactions += 1;
        match &result {
            Ok(Some(frame)) => {
                stats.responses += 1;
                stats.bytes_received += (frame.length_field() + crate::constants::FRAME_OVERHEAD) as u64;
            },
            Ok(None) | Err(ProtocolError::Timeout(_)) => stats.timeouts += 1,
            Err(_) => stats.connection_failures += 1,
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::constants::FUNC_READ;
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    #[test]
    fn test_config_validation() {
        assert!(TcpTransportConfig::new("", 8899).validate().is_err());
        assert!(TcpTransportConfig::new("10.0.0.5", 0).validate().is_err());
        assert!(TcpTransportConfig::default().validate().is_ok());
        assert_eq!(
            TcpTransportConfig::new("10.0.0.5", 8899).socket_addr(),
            "10.0.0.5:8899"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        // Bind then drop to get a port with no listener
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let link = TcpLink::new(TcpTransportConfig::new("127.0.0.1", port)).unwrap();
        let request = Frame::new(1, 100, FUNC_READ, vec![0x0B, 0x00, 0x01, 0x01, 0x01, 0x00]);
        let result = link.transact(&request, Duration::from_millis(500)).await;
        assert!(result.is_err());
        assert_eq!(link.stats().await.connection_failures, 1);
    }

    #[tokio::test]
    async fn test_read_frame_times_out_on_silence() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::new(TcpTransportConfig::new("127.0.0.1", addr.port()));
        transport.connect(Duration::from_secs(1)).await.unwrap();
        let frame = transport.read_frame(Duration::from_millis(100)).await.unwrap();
        assert!(frame.is_none());
        transport.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_frame_peer_close_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = TcpTransport::new(TcpTransportConfig::new("127.0.0.1", addr.port()));
        transport.connect(Duration::from_secs(1)).await.unwrap();
        server.await.unwrap();
        let frame = transport.read_frame(Duration::from_secs(1)).await.unwrap();
        assert!(frame.is_none());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_transact_logs_frames_and_skips_unrelated() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await.unwrap();
            // unrelated frame first, then the answer
            let other = Frame::new(100, 1, 0x55, vec![0x01]).encode().unwrap();
            let answer = Frame::new(100, 1, 0xC3, vec![0x0B, 0x00, 0x2A]).encode().unwrap();
            socket.write_all(&other).await.unwrap();
            socket.write_all(&answer).await.unwrap();
        });

        let link = TcpLink::new(TcpTransportConfig::new("127.0.0.1", addr.port())).unwrap();
        let request = Frame::new(1, 100, FUNC_READ, vec![0x0B, 0x00, 0x01, 0x01, 0x01, 0x05]);
        let response = link
            .transact(&request, Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.func, 0xC3);
        assert_eq!(response.payload, vec![0x0B, 0x00, 0x2A]);
        server.await.unwrap();

        assert!(logs_contain("TX 17B: 68 0B 00 01 00 64 00 43"));
        assert!(logs_contain("RX"));
    }
}
