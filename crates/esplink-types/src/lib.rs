//! Platform-agnostic types for ESP32 sensor links.
//!
//! This crate holds the data model shared by every esplink transport and the
//! decoder for the line-oriented telemetry protocol the sensor board emits.
//! It does no I/O.
//!
//! # Features
//!
//! - [`Reading`], [`DeviceRef`] and [`ConnectionState`]
//! - [`decode`]: lenient decoder for `T:25.5,V:3.3,B:75,L:800,H:12:34:56`
//! - [`battery`]: battery level estimation from a divided voltage
//! - Serial Port Profile UUID for RFCOMM lookups
//!
//! # Example
//!
//! ```
//! use esplink_types::{decode, DecodeError};
//!
//! let reading = decode("T:20,V:4,B:50").unwrap();
//! assert_eq!(reading.brightness_lux, 0.0);
//! assert_eq!(reading.timestamp, "--:--:--");
//!
//! assert!(matches!(decode("T:20,V:4"), Err(DecodeError::MalformedRecord(_))));
//! ```

pub mod battery;
pub mod decode;
pub mod error;
pub mod types;
pub mod uuid;

pub use battery::{BatteryProfile, estimate_percent};
pub use decode::{Decoded, Field, FieldMiss, MIN_FIELDS, decode, decode_detailed};
pub use error::{DecodeError, DecodeResult, MalformedReason};
pub use types::{ConnectionState, DeviceRef, NO_TIMESTAMP, Reading};
pub use uuid::SERIAL_PORT_PROFILE_UUID;
