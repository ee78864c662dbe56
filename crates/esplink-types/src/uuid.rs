//! Bluetooth service UUIDs used by ESP32 serial links.

use uuid::Uuid;

/// Base UUID of the Bluetooth SIG 16-bit UUID space.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

/// Serial Port Profile (SPP) service class, 0x1101.
///
/// ESP32 `BluetoothSerial` sketches advertise this service; RFCOMM clients
/// look it up in the device's SDP records to find the channel.
pub const SERIAL_PORT_PROFILE_UUID: Uuid = from_short(0x1101);

/// Expand a 16-bit SIG-assigned UUID into a full 128-bit UUID.
#[must_use]
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spp_uuid() {
        assert_eq!(
            SERIAL_PORT_PROFILE_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}
