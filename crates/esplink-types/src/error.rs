//! Error types for record decoding in esplink-types.

use core::fmt;

use thiserror::Error;

/// Errors that reject a whole record.
///
/// A single field that fails to parse never produces a `DecodeError`; the
/// field keeps its default and the miss is reported through
/// [`Decoded::misses`](crate::Decoded::misses).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The line was empty or contained only whitespace.
    #[error("Empty message")]
    EmptyMessage,

    /// The line does not have the shape of a telemetry record.
    #[error("Malformed record: {0}")]
    MalformedRecord(MalformedReason),
}

/// Why a record was rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MalformedReason {
    /// Fewer comma-separated fields than a record needs.
    TooFewFields {
        /// Number of fields found.
        found: usize,
    },
    /// The line exceeded the maximum buffered length and was discarded.
    TooLong {
        /// Number of bytes seen before the line was dropped.
        len: usize,
        /// Configured maximum line length.
        max: usize,
    },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewFields { found } => write!(
                f,
                "expected at least {} fields, got {}",
                crate::decode::MIN_FIELDS,
                found
            ),
            Self::TooLong { len, max } => {
                write!(f, "line of {} bytes exceeds limit of {} bytes", len, max)
            }
        }
    }
}

impl DecodeError {
    /// Create a malformed-record error for a line with too few fields.
    pub fn too_few_fields(found: usize) -> Self {
        Self::MalformedRecord(MalformedReason::TooFewFields { found })
    }

    /// Create a malformed-record error for an oversized line.
    pub fn too_long(len: usize, max: usize) -> Self {
        Self::MalformedRecord(MalformedReason::TooLong { len, max })
    }
}

/// Result type alias using esplink-types' DecodeError type.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(DecodeError::EmptyMessage.to_string(), "Empty message");

        let err = DecodeError::too_few_fields(2);
        assert_eq!(
            err.to_string(),
            "Malformed record: expected at least 3 fields, got 2"
        );

        let err = DecodeError::too_long(5000, 4096);
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("4096"));
    }
}
