//! Battery level estimation from a divided-down voltage measurement.
//!
//! The sensor board samples its battery through a resistor divider, so the
//! `V` field of a record is a fraction of the real pack voltage. A
//! [`BatteryProfile`] describes the divider and the usable voltage window of
//! the pack.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Divider and voltage window of a battery pack.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatteryProfile {
    /// Ratio of real pack voltage to measured voltage.
    pub divider_factor: f32,
    /// Pack voltage considered empty (0%).
    pub empty_voltage: f32,
    /// Pack voltage considered full (100%).
    pub full_voltage: f32,
}

impl Default for BatteryProfile {
    /// A 3S lead-acid style pack (11 V to 14 V) behind a 4.43:1 divider.
    fn default() -> Self {
        Self {
            divider_factor: 4.43,
            empty_voltage: 11.0,
            full_voltage: 14.0,
        }
    }
}

impl BatteryProfile {
    /// Whether the profile describes a usable window.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.divider_factor.is_finite()
            && self.divider_factor > 0.0
            && self.empty_voltage.is_finite()
            && self.full_voltage.is_finite()
            && self.full_voltage > self.empty_voltage
    }

    /// Real pack voltage for a measured (divided) voltage.
    #[must_use]
    pub fn pack_voltage(&self, measured: f32) -> f32 {
        measured * self.divider_factor
    }
}

/// Estimate the battery level (0-100) from a measured voltage.
///
/// Returns `None` if the profile is invalid or the measurement is not finite.
///
/// ```
/// use esplink_types::battery::{estimate_percent, BatteryProfile};
///
/// let profile = BatteryProfile::default();
/// // 3.16 V measured is ~14 V at the pack.
/// assert_eq!(estimate_percent(3.16, &profile), Some(100));
/// assert_eq!(estimate_percent(2.0, &profile), Some(0));
/// ```
#[must_use]
pub fn estimate_percent(measured: f32, profile: &BatteryProfile) -> Option<u8> {
    if !profile.is_valid() || !measured.is_finite() {
        return None;
    }
    let pack = profile.pack_voltage(measured);
    let span = profile.full_voltage - profile.empty_voltage;
    let percent = ((pack - profile.empty_voltage) * 100.0 / span).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        let profile = BatteryProfile {
            divider_factor: 1.0,
            empty_voltage: 10.0,
            full_voltage: 12.0,
        };
        assert_eq!(estimate_percent(11.0, &profile), Some(50));
        assert_eq!(estimate_percent(10.5, &profile), Some(25));
    }

    #[test]
    fn test_clamped() {
        let profile = BatteryProfile::default();
        assert_eq!(estimate_percent(10.0, &profile), Some(100));
        assert_eq!(estimate_percent(0.0, &profile), Some(0));
    }

    #[test]
    fn test_default_profile_window() {
        let profile = BatteryProfile::default();
        // 2.822 V * 4.43 = 12.50 V, halfway through 11-14 V.
        assert_eq!(estimate_percent(2.822, &profile), Some(50));
    }

    #[test]
    fn test_invalid_profile() {
        let profile = BatteryProfile {
            divider_factor: 1.0,
            empty_voltage: 12.0,
            full_voltage: 12.0,
        };
        assert!(!profile.is_valid());
        assert_eq!(estimate_percent(12.0, &profile), None);
        assert_eq!(estimate_percent(f32::NAN, &BatteryProfile::default()), None);
    }
}
