//! Transport abstraction for sensor links.
//!
//! A [`Transport`] turns a [`DeviceRef`] into an open byte stream. The
//! session manager owns every stream it opens; dropping the stream closes
//! the underlying socket, which is how a pending read is cancelled.
//!
//! Provided transports:
//!
//! | Transport | Address format | Availability |
//! |-----------|----------------|--------------|
//! | [`TcpTransport`] | `host:port` | always |
//! | `RfcommTransport` | `AA:BB:CC:DD:EE:FF[/channel]` | Linux, feature `rfcomm` |
//! | [`MockTransport`](crate::mock::MockTransport) | any | always |

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tracing::debug;

use esplink_types::DeviceRef;

use crate::error::{Error, Result};

/// An open, readable stream to a device.
pub trait TransportStream: AsyncRead + Send + Unpin {}

impl<T: AsyncRead + Send + Unpin + ?Sized> TransportStream for T {}

/// Boxed transport stream as handed to the session.
pub type BoxedStream = Box<dyn TransportStream>;

/// Something that can open a stream to a device.
///
/// Implementations should fail promptly with
/// [`Error::ConnectionFailed`] when the device cannot be reached, and must
/// be cancel-safe: the session drops the `open` future when a newer
/// `connect` or a `stop` supersedes it.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a stream to `device`.
    async fn open(&self, device: &DeviceRef) -> Result<BoxedStream>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(&self, device: &DeviceRef) -> Result<BoxedStream> {
        (**self).open(device).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Serial-over-TCP transport (ESP32 Wi-Fi serial bridges).
#[derive(Debug, Clone)]
pub struct TcpTransport {
    nodelay: bool,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self { nodelay: true }
    }
}

impl TcpTransport {
    /// Create a TCP transport with `TCP_NODELAY` enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable `TCP_NODELAY` on opened streams.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self, device: &DeviceRef) -> Result<BoxedStream> {
        let address = device.address();
        if !address.contains(':') {
            return Err(Error::invalid_address(address, "expected host:port"));
        }

        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| Error::open_failed(address, &e))?;
        stream.set_nodelay(self.nodelay)?;
        debug!("TCP stream open to {}", address);
        Ok(Box::new(stream))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// Split an optional `/channel` suffix off a device address.
///
/// ```
/// use esplink_core::transport::split_channel;
///
/// assert_eq!(split_channel("AA:BB:CC:DD:EE:FF/3").unwrap(), ("AA:BB:CC:DD:EE:FF", Some(3)));
/// assert_eq!(split_channel("AA:BB:CC:DD:EE:FF").unwrap(), ("AA:BB:CC:DD:EE:FF", None));
/// assert!(split_channel("AA:BB:CC:DD:EE:FF/99").is_err());
/// ```
pub fn split_channel(address: &str) -> Result<(&str, Option<u8>)> {
    let Some((addr, channel)) = address.split_once('/') else {
        return Ok((address, None));
    };
    match channel.parse::<u8>() {
        Ok(channel @ 1..=30) => Ok((addr, Some(channel))),
        _ => Err(Error::invalid_address(
            address,
            "RFCOMM channel must be 1-30",
        )),
    }
}

#[cfg(all(target_os = "linux", feature = "rfcomm"))]
pub use rfcomm::RfcommTransport;

#[cfg(all(target_os = "linux", feature = "rfcomm"))]
mod rfcomm {
    use async_trait::async_trait;
    use bluer::rfcomm::{SocketAddr, Stream};
    use tracing::debug;

    use esplink_types::DeviceRef;

    use super::{BoxedStream, Transport, split_channel};
    use crate::error::{Error, Result};

    /// Channel ESP32 `BluetoothSerial` registers its SPP service on.
    pub const DEFAULT_CHANNEL: u8 = 1;

    /// Bluetooth Classic RFCOMM transport (BlueZ).
    ///
    /// The device must already be paired with the local adapter.
    #[derive(Debug, Clone)]
    pub struct RfcommTransport {
        default_channel: u8,
    }

    impl Default for RfcommTransport {
        fn default() -> Self {
            Self {
                default_channel: DEFAULT_CHANNEL,
            }
        }
    }

    impl RfcommTransport {
        /// Create an RFCOMM transport using channel 1 unless the address says otherwise.
        pub fn new() -> Self {
            Self::default()
        }

        /// Set the channel used for addresses without a `/channel` suffix.
        #[must_use]
        pub fn default_channel(mut self, channel: u8) -> Self {
            self.default_channel = channel;
            self
        }
    }

    #[async_trait]
    impl Transport for RfcommTransport {
        async fn open(&self, device: &DeviceRef) -> Result<BoxedStream> {
            let (addr, channel) = split_channel(device.address())?;
            let addr: bluer::Address = addr
                .parse()
                .map_err(|_| Error::invalid_address(device.address(), "not a Bluetooth address"))?;
            let channel = channel.unwrap_or(self.default_channel);

            let stream = Stream::connect(SocketAddr::new(addr, channel))
                .await
                .map_err(|e| Error::open_failed(device.address(), &e))?;
            debug!("RFCOMM stream open to {} channel {}", addr, channel);
            Ok(Box::new(stream))
        }

        fn name(&self) -> &'static str {
            "rfcomm"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_rejects_address_without_port() {
        let transport = TcpTransport::new();
        let result = transport.open(&DeviceRef::from_address("esp32.local")).await;
        assert!(matches!(result, Err(Error::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_tcp_reads_from_listener() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"T:1,V:2,B:3\n").await.unwrap();
        });

        let mut stream = TcpTransport::new()
            .open(&DeviceRef::from_address(address))
            .await
            .unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "T:1,V:2,B:3\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_refused_is_connection_failure() {
        use tokio::net::TcpListener;

        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpTransport::new()
            .open(&DeviceRef::from_address(address))
            .await;
        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
    }

    #[test]
    fn test_split_channel_rejects_zero() {
        assert!(split_channel("AA:BB:CC:DD:EE:FF/0").is_err());
        assert!(split_channel("AA:BB:CC:DD:EE:FF/x").is_err());
    }
}
