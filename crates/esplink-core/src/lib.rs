//! Core connection library for ESP32 sensor boards.
//!
//! This crate keeps one live link to a sensor board that streams telemetry
//! records (`T:25.5,V:3.3,B:75,L:800,H:12:34:56`) over a serial-style byte
//! stream, decodes them and publishes the results as events.
//!
//! # Features
//!
//! - **Session lifecycle**: `Idle`, `Connecting` and `Connected` with strict,
//!   ordered state notifications
//! - **Cancellation**: a new `connect` or a `stop` supersedes any in-flight
//!   attempt; stale attempts never report
//! - **Lenient decoding**: malformed records are dropped and logged, bad
//!   fields fall back to defaults
//! - **Transports**: serial-over-TCP, Bluetooth RFCOMM (Linux, feature
//!   `rfcomm`) and an in-memory mock for tests
//! - **Metrics**: connect timings and record counters
//!
//! # Quick Start
//!
//! ```no_run
//! use esplink_core::{SessionEvent, SessionManager, SessionOptions, TcpTransport};
//! use esplink_types::DeviceRef;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = SessionOptions::builder()
//!         .connect_timeout(Duration::from_secs(10))
//!         .build();
//!     let session = SessionManager::new(TcpTransport::new(), options)?;
//!     let mut events = session.subscribe();
//!
//!     session.connect(DeviceRef::new("192.168.4.1:3333", "Greenhouse"));
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SessionEvent::StateChanged { state } => println!("state: {}", state),
//!             SessionEvent::Reading { reading, .. } => println!("{}", reading),
//!             SessionEvent::ConnectionFailed { reason, .. } => {
//!                 eprintln!("failed: {}", reason);
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod metrics;
pub mod mock;
pub mod options;
pub mod session;
pub mod transport;

// Core exports
pub use error::{ConnectionFailureReason, Error, Result};
pub use options::{SessionOptions, SessionOptionsBuilder};
pub use session::SessionManager;

/// Type alias for a shared session manager.
///
/// `SessionManager` does not implement `Clone`, and dropping it stops the
/// session; share it between tasks through an `Arc`.
pub type SharedSession = std::sync::Arc<SessionManager>;

pub use codec::{Record, RecordCodec};
pub use events::{EventDispatcher, EventReceiver, EventSender, SessionEvent};
pub use metrics::{OperationMetrics, SessionMetrics};
pub use mock::{MockPeer, MockTransport};
pub use transport::{BoxedStream, TcpTransport, Transport, TransportStream};

#[cfg(all(target_os = "linux", feature = "rfcomm"))]
pub use transport::RfcommTransport;

// Re-export from esplink-types
pub use esplink_types::{ConnectionState, DecodeError, DeviceRef, Reading};
