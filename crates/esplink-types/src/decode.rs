//! Decoder for the line-oriented telemetry protocol.
//!
//! A record is one line of comma-separated `key:value` tokens:
//!
//! ```text
//! T:25.5,V:3.3,B:75,L:800,H:12:34:56
//! ```
//!
//! | Key | Field | Type | Default |
//! |-----|-------|------|---------|
//! | `T` | temperature (°C) | float | `0` |
//! | `V` | voltage (V) | float | `0` |
//! | `B` | battery (%) | integer | `0` |
//! | `L` | brightness (lux) | float | `0` |
//! | `H` | device timestamp | string | `--:--:--` |
//!
//! Parsing is lenient. Only two conditions reject a whole line: it is empty,
//! or it has fewer than [`MIN_FIELDS`] tokens. Everything else degrades per
//! token: unknown keys and tokens without a `:` are skipped, and a value that
//! does not parse for its key leaves that field at its default.

use core::fmt;

use crate::error::{DecodeError, DecodeResult};
use crate::types::Reading;

/// Minimum number of comma-separated tokens in a record.
pub const MIN_FIELDS: usize = 3;

/// A recognized record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `T`
    Temperature,
    /// `V`
    Voltage,
    /// `B`
    Battery,
    /// `L`
    Brightness,
    /// `H`
    Timestamp,
}

impl Field {
    /// Look up a field by its wire key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "T" => Some(Field::Temperature),
            "V" => Some(Field::Voltage),
            "B" => Some(Field::Battery),
            "L" => Some(Field::Brightness),
            "H" => Some(Field::Timestamp),
            _ => None,
        }
    }

    /// The wire key of this field.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Field::Temperature => "T",
            Field::Voltage => "V",
            Field::Battery => "B",
            Field::Brightness => "L",
            Field::Timestamp => "H",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A field whose value could not be parsed and kept its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMiss {
    /// The field that was skipped.
    pub field: Field,
    /// The raw value that failed to parse.
    pub value: String,
}

impl fmt::Display for FieldMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.value)
    }
}

/// A decoded reading together with the fields that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The decoded reading.
    pub reading: Reading,
    /// Fields whose values did not parse.
    pub misses: Vec<FieldMiss>,
}

impl Decoded {
    /// Whether every recognized field parsed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.misses.is_empty()
    }
}

/// Decode one record into a [`Reading`].
///
/// ```
/// use esplink_types::decode;
///
/// let reading = decode("T:25.5,V:3.3,B:75,L:800,H:12:34:56").unwrap();
/// assert_eq!(reading.temperature_c, 25.5);
/// assert_eq!(reading.timestamp, "12:34:56");
/// ```
pub fn decode(line: &str) -> DecodeResult<Reading> {
    decode_detailed(line).map(|decoded| decoded.reading)
}

/// Decode one record, also reporting fields that fell back to their default.
pub fn decode_detailed(line: &str) -> DecodeResult<Decoded> {
    if line.trim().is_empty() {
        return Err(DecodeError::EmptyMessage);
    }

    let mut tokens: Vec<&str> = line.split(',').collect();
    while tokens.last().is_some_and(|token| token.is_empty()) {
        tokens.pop();
    }
    if tokens.len() < MIN_FIELDS {
        return Err(DecodeError::too_few_fields(tokens.len()));
    }

    let mut reading = Reading::default();
    let mut misses = Vec::new();

    for token in tokens {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        let Some(field) = Field::from_key(key.trim()) else {
            continue;
        };
        let value = value.trim();

        let applied = match field {
            Field::Temperature => assign(&mut reading.temperature_c, parse_float(value)),
            Field::Voltage => assign(&mut reading.voltage, parse_float(value)),
            Field::Brightness => assign(&mut reading.brightness_lux, parse_float(value)),
            Field::Battery => assign(&mut reading.battery_percent, parse_percent(value)),
            Field::Timestamp => assign(
                &mut reading.timestamp,
                (!value.is_empty()).then(|| value.to_string()),
            ),
        };

        if !applied {
            misses.push(FieldMiss {
                field,
                value: value.to_string(),
            });
        }
    }

    Ok(Decoded { reading, misses })
}

fn assign<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn parse_float(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_percent(value: &str) -> Option<u8> {
    value
        .parse::<i64>()
        .ok()
        .map(|v| v.clamp(0, 100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalformedReason;
    use crate::types::NO_TIMESTAMP;

    #[test]
    fn test_decode_full_record() {
        let reading = decode("T:25.5,V:3.3,B:75,L:800,H:12:34:56").unwrap();
        assert_eq!(
            reading,
            Reading {
                temperature_c: 25.5,
                voltage: 3.3,
                battery_percent: 75,
                brightness_lux: 800.0,
                timestamp: "12:34:56".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_applies_defaults() {
        let reading = decode("T:20,V:4,B:50").unwrap();
        assert_eq!(reading.temperature_c, 20.0);
        assert_eq!(reading.voltage, 4.0);
        assert_eq!(reading.battery_percent, 50);
        assert_eq!(reading.brightness_lux, 0.0);
        assert_eq!(reading.timestamp, NO_TIMESTAMP);
    }

    #[test]
    fn test_decode_skips_unparsable_field() {
        let decoded = decode_detailed("T:abc,V:4,B:50").unwrap();
        assert_eq!(decoded.reading.temperature_c, 0.0);
        assert_eq!(decoded.reading.voltage, 4.0);
        assert_eq!(decoded.reading.battery_percent, 50);
        assert_eq!(
            decoded.misses,
            vec![FieldMiss {
                field: Field::Temperature,
                value: "abc".to_string()
            }]
        );
        assert!(!decoded.is_clean());
    }

    #[test]
    fn test_decode_rejects_two_fields() {
        let err = decode("T:20,V:4").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedRecord(MalformedReason::TooFewFields { found: 2 })
        );
    }

    #[test]
    fn test_decode_trailing_comma_does_not_count() {
        assert_eq!(decode("T:20,V:4,"), Err(DecodeError::too_few_fields(2)));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(""), Err(DecodeError::EmptyMessage));
        assert_eq!(decode("   \t "), Err(DecodeError::EmptyMessage));
    }

    #[test]
    fn test_field_count_checked_before_keys() {
        // Three tokens, none of them recognized: still a valid (all-default) reading.
        let reading = decode("foo,bar,baz").unwrap();
        assert_eq!(reading, Reading::default());
    }

    #[test]
    fn test_decode_any_order_and_unknown_keys() {
        let reading = decode("H:08:00:01,X:9,B:10,T:-4.25,V:3.95").unwrap();
        assert_eq!(reading.temperature_c, -4.25);
        assert_eq!(reading.voltage, 3.95);
        assert_eq!(reading.battery_percent, 10);
        assert_eq!(reading.timestamp, "08:00:01");
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let reading = decode(" T: 21.5 , V:3.1 ,B: 42 ").unwrap();
        assert_eq!(reading.temperature_c, 21.5);
        assert_eq!(reading.voltage, 3.1);
        assert_eq!(reading.battery_percent, 42);
    }

    #[test]
    fn test_decode_battery_is_integer_and_clamped() {
        let decoded = decode_detailed("T:1,V:2,B:55.5").unwrap();
        assert_eq!(decoded.reading.battery_percent, 0);
        assert_eq!(decoded.misses[0].field, Field::Battery);

        assert_eq!(decode("T:1,V:2,B:140").unwrap().battery_percent, 100);
        assert_eq!(decode("T:1,V:2,B:-3").unwrap().battery_percent, 0);
    }

    #[test]
    fn test_decode_rejects_non_finite_floats() {
        let decoded = decode_detailed("T:NaN,V:inf,B:5").unwrap();
        assert_eq!(decoded.reading.temperature_c, 0.0);
        assert_eq!(decoded.reading.voltage, 0.0);
        assert_eq!(decoded.misses.len(), 2);
    }

    #[test]
    fn test_decode_empty_timestamp_keeps_default() {
        let reading = decode("T:1,V:2,B:3,H:").unwrap();
        assert_eq!(reading.timestamp, NO_TIMESTAMP);
    }

    #[test]
    fn test_decode_last_duplicate_wins() {
        let reading = decode("T:1,T:2,V:3,B:4").unwrap();
        assert_eq!(reading.temperature_c, 2.0);
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in [
            Field::Temperature,
            Field::Voltage,
            Field::Battery,
            Field::Brightness,
            Field::Timestamp,
        ] {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("t"), None);
    }
}
