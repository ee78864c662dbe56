//! Error types for esplink-core.
//!
//! This module defines the errors that can occur while opening or reading a
//! transport stream to a sensor device.
//!
//! # How errors reach the consumer
//!
//! The session manager never returns transport errors from
//! [`connect`](crate::SessionManager::connect): the connection is opened in
//! the background. Instead, each failure is converted into a
//! [`ConnectionFailureReason`] and published as a
//! [`SessionEvent::ConnectionFailed`](crate::SessionEvent::ConnectionFailed).
//!
//! | Error | Where it happens | Session outcome |
//! |-------|------------------|-----------------|
//! | [`Error::ConnectionFailed`] | opening the stream | `ConnectionFailed`, state `Idle` |
//! | [`Error::Timeout`] | opening the stream, idle read | `ConnectionFailed`, state `Idle` |
//! | [`Error::Io`] | reading the stream | `ConnectionFailed`, state `Idle` |
//!
//! An attempt superseded by `connect` or `stop` ends silently and produces
//! no error at all.
//!
//! Decode errors are per record and never surface here; see
//! [`esplink_types::DecodeError`].
//!
//! None of these are retried automatically. Call `connect` again to retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to a sensor device.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Opening the transport stream failed.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The device address that failed to connect.
        device_id: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// I/O error on an open stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The device address cannot be used by this transport.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A session manager was created outside of a tokio runtime.
    #[error("No tokio runtime available")]
    NoRuntime,
}

/// Structured reasons for connection failures.
///
/// Carried by [`Error::ConnectionFailed`] and by the
/// `ConnectionFailed` session event.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// Device is unreachable (out of range, powered off, unknown address).
    Unreachable,
    /// Device refused the connection.
    Refused,
    /// Opening or reading timed out.
    Timeout,
    /// The device closed the stream.
    Closed,
    /// The address was not usable by the transport.
    InvalidAddress(String),
    /// I/O error on the stream.
    Io(String),
    /// Other/unknown error.
    Other(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable => write!(f, "device unreachable"),
            Self::Refused => write!(f, "connection refused by device"),
            Self::Timeout => write!(f, "timed out"),
            Self::Closed => write!(f, "stream closed by device"),
            Self::InvalidAddress(msg) => write!(f, "invalid address: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl ConnectionFailureReason {
    /// Classify an I/O error.
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::ConnectionRefused => Self::Refused,
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::NotFound
            | ErrorKind::AddrNotAvailable
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable => Self::Unreachable,
            ErrorKind::UnexpectedEof => Self::Closed,
            _ => Self::Io(err.to_string()),
        }
    }
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an invalid address error.
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(device_id: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { device_id, reason }
    }

    /// Create a connection failure from an I/O error raised while opening.
    pub fn open_failed(device_id: impl Into<String>, err: &std::io::Error) -> Self {
        Self::ConnectionFailed {
            device_id: Some(device_id.into()),
            reason: ConnectionFailureReason::from_io(err),
        }
    }

    /// The reason reported to the consumer for this error.
    pub fn failure_reason(&self) -> ConnectionFailureReason {
        match self {
            Self::ConnectionFailed { reason, .. } => reason.clone(),
            Self::Io(err) => ConnectionFailureReason::from_io(err),
            Self::Timeout { .. } => ConnectionFailureReason::Timeout,
            Self::InvalidAddress { reason, .. } => {
                ConnectionFailureReason::InvalidAddress(reason.clone())
            }
            other => ConnectionFailureReason::Other(other.to_string()),
        }
    }
}

/// Result type alias using esplink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::timeout("open", Duration::from_secs(10));
        assert!(err.to_string().contains("open"));
        assert!(err.to_string().contains("10s"));

        let err = Error::invalid_address("nope", "expected host:port");
        assert_eq!(
            err.to_string(),
            "Invalid address 'nope': expected host:port"
        );

        let err = Error::connection_failed(
            Some("AA:BB:CC:DD:EE:FF".to_string()),
            ConnectionFailureReason::Refused,
        );
        assert_eq!(
            err.to_string(),
            "Connection failed: connection refused by device"
        );

        assert_eq!(Error::NoRuntime.to_string(), "No tokio runtime available");
    }

    #[test]
    fn test_io_error_classification() {
        use std::io::{Error as IoError, ErrorKind};

        let refused = IoError::new(ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            ConnectionFailureReason::from_io(&refused),
            ConnectionFailureReason::Refused
        );

        let eof = IoError::new(ErrorKind::UnexpectedEof, "eof");
        assert_eq!(
            ConnectionFailureReason::from_io(&eof),
            ConnectionFailureReason::Closed
        );

        let reset = IoError::new(ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            ConnectionFailureReason::from_io(&reset),
            ConnectionFailureReason::Io(_)
        ));
    }

    #[test]
    fn test_failure_reason_mapping() {
        let err = Error::timeout("open", Duration::from_secs(1));
        assert_eq!(err.failure_reason(), ConnectionFailureReason::Timeout);

        let err: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.failure_reason(), ConnectionFailureReason::Timeout);

        let err = Error::invalid_address("x", "expected host:port");
        assert_eq!(
            err.failure_reason(),
            ConnectionFailureReason::InvalidAddress("expected host:port".into())
        );
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&ConnectionFailureReason::Io("reset".into())).unwrap();
        assert_eq!(json, r#"{"kind":"io","detail":"reset"}"#);

        let json = serde_json::to_string(&ConnectionFailureReason::Closed).unwrap();
        assert_eq!(json, r#"{"kind":"closed"}"#);
    }
}
