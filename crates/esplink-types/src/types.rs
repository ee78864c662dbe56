//! Core types for ESP32 sensor telemetry.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decode::decode;
use crate::error::DecodeError;

/// Timestamp shown when a record carries no `H` field.
pub const NO_TIMESTAMP: &str = "--:--:--";

/// Identifier of a remote sensor device.
///
/// The address is platform-specific and opaque to the session: a Bluetooth
/// MAC (`AA:BB:CC:DD:EE:FF`, optionally with a `/channel` suffix for RFCOMM)
/// or a `host:port` pair for serial-over-TCP bridges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceRef {
    address: String,
    name: String,
}

impl DeviceRef {
    /// Create a device reference from an address and a display name.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Create a device reference whose name is its address.
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
        }
    }

    /// The transport address of the device.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The human-readable device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.address {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

/// Lifecycle state of a connection session.
///
/// `Idle` is both the initial state and the only state at rest. The
/// transitions a session performs are `Idle -> Connecting`,
/// `Connecting -> Connected`, `Connecting -> Idle` and `Connected -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionState {
    /// No transport handle and no reader task.
    #[default]
    Idle,
    /// A transport stream is being opened.
    Connecting,
    /// A transport stream is open and a read loop is running on it.
    Connected,
}

impl ConnectionState {
    /// Whether `self -> next` is a transition a session may announce.
    #[must_use]
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Idle, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connecting, ConnectionState::Idle)
                | (ConnectionState::Connected, ConnectionState::Idle)
        )
    }

    /// Returns `true` for [`ConnectionState::Connected`].
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// One decoded telemetry sample.
///
/// Readings are plain values: the session hands each one to the consumer and
/// keeps no history.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Measured voltage in volts.
    pub voltage: f32,
    /// Battery level (0-100).
    pub battery_percent: u8,
    /// Ambient brightness in lux.
    pub brightness_lux: f32,
    /// Device-side timestamp, free-form (usually `HH:MM:SS`).
    pub timestamp: String,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            temperature_c: 0.0,
            voltage: 0.0,
            battery_percent: 0,
            brightness_lux: 0.0,
            timestamp: NO_TIMESTAMP.to_string(),
        }
    }
}

impl Reading {
    /// Whether the record carried a timestamp.
    #[must_use]
    pub fn has_timestamp(&self) -> bool {
        self.timestamp != NO_TIMESTAMP
    }

    /// Parse the device timestamp as a time of day (`HH:MM:SS`).
    ///
    /// Returns `None` for the placeholder timestamp or anything that is not a
    /// valid wall-clock time.
    ///
    /// ```
    /// use esplink_types::Reading;
    ///
    /// let reading: Reading = "T:21,V:3.3,B:80,H:12:34:56".parse().unwrap();
    /// let time = reading.time_of_day().unwrap();
    /// assert_eq!((time.hour(), time.minute(), time.second()), (12, 34, 56));
    /// ```
    #[must_use]
    pub fn time_of_day(&self) -> Option<time::Time> {
        if !self.has_timestamp() {
            return None;
        }
        let format = time::format_description::parse("[hour]:[minute]:[second]").ok()?;
        time::Time::parse(&self.timestamp, &format).ok()
    }
}

impl FromStr for Reading {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} °C, {:.2} V, {}%, {:.0} lux @ {}",
            self.temperature_c,
            self.voltage,
            self.battery_percent,
            self.brightness_lux,
            self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ref_display() {
        let device = DeviceRef::new("AA:BB:CC:DD:EE:FF", "ESP32-Sensor");
        assert_eq!(device.to_string(), "ESP32-Sensor (AA:BB:CC:DD:EE:FF)");

        let device = DeviceRef::from_address("192.168.4.1:8080");
        assert_eq!(device.name(), "192.168.4.1:8080");
        assert_eq!(device.to_string(), "192.168.4.1:8080");
    }

    #[test]
    fn test_allowed_transitions() {
        use ConnectionState::*;

        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Idle));
        assert!(Connected.can_transition_to(Idle));

        assert!(!Idle.can_transition_to(Connected));
        assert!(!Idle.can_transition_to(Idle));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Connecting.can_transition_to(Connecting));
    }

    #[test]
    fn test_default_reading() {
        let reading = Reading::default();
        assert_eq!(reading.timestamp, NO_TIMESTAMP);
        assert!(!reading.has_timestamp());
        assert!(reading.time_of_day().is_none());
    }

    #[test]
    fn test_time_of_day_rejects_garbage() {
        let reading = Reading {
            timestamp: "25:99:00".to_string(),
            ..Default::default()
        };
        assert!(reading.time_of_day().is_none());
    }

    #[test]
    fn test_reading_display() {
        let reading: Reading = "T:25.5,V:3.3,B:75,L:800,H:12:34:56".parse().unwrap();
        assert_eq!(reading.to_string(), "25.5 °C, 3.30 V, 75%, 800 lux @ 12:34:56");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_connection_state_serialization() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
    }
}
