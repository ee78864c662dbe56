//! Session configuration.
//!
//! Use the builder for convenient configuration:
//!
//! ```
//! use std::time::Duration;
//! use esplink_core::SessionOptions;
//!
//! let options = SessionOptions::builder()
//!     .connect_timeout(Duration::from_secs(10))
//!     .max_line_length(1024)
//!     .build();
//! assert!(options.validate().is_ok());
//! ```
//!
//! Options also deserialize from an embedding application's config file,
//! with durations given in milliseconds:
//!
//! ```toml
//! connect_timeout_ms = 10000
//! read_timeout_ms = 30000
//! max_line_length = 4096
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default cap on a buffered record, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Smallest accepted line cap; a full record is well over this.
pub const MIN_MAX_LINE_LENGTH: usize = 64;

/// Options for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Give up opening the stream after this long.
    ///
    /// `None` (default) waits until the transport itself fails.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Option<Duration>,
    /// Treat the stream as dead when no record arrives for this long.
    ///
    /// `None` (default) waits indefinitely; the sensor may report rarely.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Option<Duration>,
    /// Longest record buffered before it is discarded as malformed.
    pub max_line_length: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl SessionOptions {
    /// Create a new builder for SessionOptions.
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `max_line_length` is at least [`MIN_MAX_LINE_LENGTH`]
    /// - timeouts, when set, are > 0
    pub fn validate(&self) -> Result<()> {
        if self.max_line_length < MIN_MAX_LINE_LENGTH {
            return Err(Error::invalid_config(format!(
                "max_line_length must be >= {}",
                MIN_MAX_LINE_LENGTH
            )));
        }
        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config("connect_timeout must be > 0"));
        }
        if self.read_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config("read_timeout must be > 0"));
        }
        Ok(())
    }
}

/// Builder for SessionOptions.
#[derive(Debug, Clone, Default)]
pub struct SessionOptionsBuilder {
    options: SessionOptions,
}

impl SessionOptionsBuilder {
    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Set the idle read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = Some(timeout);
        self
    }

    /// Set the maximum record length in bytes.
    #[must_use]
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.options.max_line_length = len;
        self
    }

    /// Build the SessionOptions.
    #[must_use]
    pub fn build(self) -> SessionOptions {
        self.options
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SessionOptions::default();
        assert_eq!(opts.connect_timeout, None);
        assert_eq!(opts.read_timeout, None);
        assert_eq!(opts.max_line_length, 4096);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_builder_partial() {
        let opts = SessionOptions::builder()
            .read_timeout(Duration::from_secs(30))
            .build();
        assert_eq!(opts.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(opts.connect_timeout, None); // default
        assert_eq!(opts.max_line_length, DEFAULT_MAX_LINE_LENGTH); // default
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let opts = SessionOptions::builder().max_line_length(8).build();
        assert!(matches!(opts.validate(), Err(Error::InvalidConfig(_))));

        let opts = SessionOptions::builder()
            .connect_timeout(Duration::ZERO)
            .build();
        assert!(opts.validate().is_err());

        let opts = SessionOptions::builder().read_timeout(Duration::ZERO).build();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_deserialize_millis() {
        let opts: SessionOptions =
            serde_json::from_str(r#"{"connect_timeout_ms": 2500, "max_line_length": 512}"#)
                .unwrap();
        assert_eq!(opts.connect_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(opts.read_timeout, None);
        assert_eq!(opts.max_line_length, 512);

        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains(r#""connect_timeout_ms":2500"#));
        assert!(json.contains(r#""read_timeout_ms":null"#));
    }
}
