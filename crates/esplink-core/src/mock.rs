//! Mock transport for testing.
//!
//! This module provides an in-memory transport that can be used to drive a
//! [`SessionManager`](crate::SessionManager) without a radio or a network.
//!
//! Every successful `open` creates a duplex pipe. The session gets one end,
//! the test gets the other as a [`MockPeer`] from [`MockTransport::accept`]
//! and plays the sensor: it writes records, closes the stream, or waits to
//! see the session close it.
//!
//! # Features
//!
//! - **Failure injection**: refuse connections to specific addresses
//! - **Latency simulation**: delay opens, or hold them until released
//! - **Open counting**: check how many streams the session asked for

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::{Notify, mpsc};

use esplink_types::DeviceRef;

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::transport::{BoxedStream, Transport};

const PIPE_CAPACITY: usize = 64 * 1024;

/// How the mock answers an `open` for one address.
#[derive(Debug, Clone, Default)]
enum Behavior {
    #[default]
    Accept,
    Delay(Duration),
    Refuse(ConnectionFailureReason),
    Hold(std::sync::Arc<Notify>),
    Hang,
}

/// A mock transport for testing.
///
/// # Example
///
/// ```
/// use esplink_core::{MockTransport, SessionManager, SessionOptions};
/// use esplink_types::{ConnectionState, DeviceRef};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let transport = Arc::new(MockTransport::new());
///     let session = SessionManager::new(transport.clone(), SessionOptions::default()).unwrap();
///
///     session.connect(DeviceRef::new("mock-1", "Bench sensor"));
///     let mut peer = transport.accept().await;
///     peer.send_line("T:21.5,V:3.3,B:90").await.unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    behaviors: Mutex<HashMap<String, Behavior>>,
    opens: AtomicU32,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock transport that accepts every address immediately.
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            behaviors: Mutex::new(HashMap::new()),
            opens: AtomicU32::new(0),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        }
    }

    fn set(&self, address: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(address.to_string(), behavior);
    }

    fn behavior(&self, address: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Refuse opens to `address` with the given reason.
    pub fn refuse(&self, address: &str, reason: ConnectionFailureReason) {
        self.set(address, Behavior::Refuse(reason));
    }

    /// Accept opens to `address` after `latency`.
    pub fn delay(&self, address: &str, latency: Duration) {
        self.set(address, Behavior::Delay(latency));
    }

    /// Hold opens to `address` until the returned handle is notified.
    pub fn hold(&self, address: &str) -> std::sync::Arc<Notify> {
        let gate = std::sync::Arc::new(Notify::new());
        self.set(address, Behavior::Hold(gate.clone()));
        gate
    }

    /// Never complete opens to `address`.
    pub fn hang(&self, address: &str) {
        self.set(address, Behavior::Hang);
    }

    /// Accept opens to `address` immediately (the default).
    pub fn accept_all(&self, address: &str) {
        self.set(address, Behavior::Accept);
    }

    /// Number of times `open` has been called.
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Wait for the next stream the session opens.
    pub async fn accept(&self) -> MockPeer {
        self.peers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("MockTransport owns its sender")
    }

    /// Take an already-opened peer without waiting.
    pub fn try_accept(&self) -> Option<MockPeer> {
        self.peers_rx.try_lock().ok()?.try_recv().ok()
    }

    fn pipe(&self, device: &DeviceRef) -> BoxedStream {
        let (session_end, peer_end) = tokio::io::duplex(PIPE_CAPACITY);
        let _ = self.peers_tx.send(MockPeer {
            device: device.clone(),
            stream: peer_end,
        });
        Box::new(session_end)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, device: &DeviceRef) -> Result<BoxedStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        match self.behavior(device.address()) {
            Behavior::Accept => {}
            Behavior::Delay(latency) => tokio::time::sleep(latency).await,
            Behavior::Refuse(reason) => {
                return Err(Error::connection_failed(
                    Some(device.address().to_string()),
                    reason,
                ));
            }
            Behavior::Hold(gate) => gate.notified().await,
            Behavior::Hang => std::future::pending::<()>().await,
        }

        Ok(self.pipe(device))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// The sensor side of a mock stream.
#[derive(Debug)]
pub struct MockPeer {
    device: DeviceRef,
    stream: DuplexStream,
}

impl MockPeer {
    /// The device the session opened this stream for.
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    /// Send one record followed by `\n`.
    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await
    }

    /// Send raw bytes, e.g. a partial record.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Close the stream from the sensor side.
    pub fn close(self) {
        drop(self.stream);
    }

    /// Wait until the session drops its end of the stream.
    pub async fn closed(mut self) {
        let mut buf = [0u8; 64];
        while matches!(self.stream.read(&mut buf).await, Ok(n) if n > 0) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accept_pairs_streams() {
        let transport = MockTransport::new();
        let mut stream = transport
            .open(&DeviceRef::from_address("mock-1"))
            .await
            .unwrap();

        let mut peer = transport.accept().await;
        assert_eq!(peer.device().address(), "mock-1");
        peer.send_line("hello").await.unwrap();
        peer.close();

        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "hello\n");
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_refuse() {
        let transport = MockTransport::new();
        transport.refuse("mock-2", ConnectionFailureReason::Refused);

        let err = transport
            .open(&DeviceRef::from_address("mock-2"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.failure_reason(), ConnectionFailureReason::Refused);
        assert!(transport.try_accept().is_none());
    }

    #[tokio::test]
    async fn test_closed_detects_session_drop() {
        let transport = MockTransport::new();
        let stream = transport
            .open(&DeviceRef::from_address("mock-3"))
            .await
            .unwrap();
        let peer = transport.accept().await;

        drop(stream);
        peer.closed().await;
    }
}
