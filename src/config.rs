//! Hardware and protocol configuration constants for the ESP32-S3 BLE-MIDI board

use uuid::Uuid;

/// Status LED on GPIO48 (active low)
pub mod led {
    /// Duration of an LED flash for incoming notes in milliseconds
    pub const FLASH_MS: u64 = 30;
}

/// BLE configuration
pub mod ble {
    use super::Uuid;

    /// Advertised device name
    pub const DEVICE_NAME: &str = "BLE-MIDI";

    /// Static random address suffix (first three bytes come from the MAC)
    pub const ADDRESS_SUFFIX: [u8; 3] = [0x4D, 0x49, 0xC4];

    /// BLE-MIDI service
    pub const MIDI_SERVICE_UUID: Uuid = Uuid::from_u128(0x03b80e5a_ede8_4b33_a751_6ce34ec4c700);

    /// BLE-MIDI I/O characteristic
    pub const MIDI_CHARACTERISTIC_UUID: Uuid =
        Uuid::from_u128(0x7772e5db_3868_4112_a1a9_f2669d106bf3);

    /// Client Characteristic Configuration descriptor
    pub const CCCD_UUID16: u16 = 0x2902;

    /// Size of the characteristic value buffer
    pub const MIDI_VALUE_SIZE: usize = 512;

    /// Number of maximum concurrent connections
    pub const CONNECTIONS_MAX: usize = 1;

    /// Number of L2CAP channels
    pub const L2CAP_CHANNELS_MAX: usize = 3;

    /// First attribute handle handed to our service table
    pub const FIRST_HANDLE: u16 = 1;
}

/// MIDI constants
pub mod midi {
    /// BLE-MIDI header byte (bit 7 set, timestamp high bits zero)
    pub const PACKET_HEADER: u8 = 0x80;

    /// BLE-MIDI timestamp byte (bit 7 set, timestamp low bits zero)
    pub const PACKET_TIMESTAMP: u8 = 0x80;

    /// Note Off status on channel 0
    pub const STATUS_NOTE_OFF: u8 = 0x80;

    /// Note On status on channel 0
    pub const STATUS_NOTE_ON: u8 = 0x90;

    /// Length of a single-note BLE-MIDI packet
    pub const NOTE_PACKET_LEN: usize = 5;

    /// Velocity used for key presses
    pub const DEFAULT_VELOCITY: u8 = 100;
}

/// Key bank
pub mod keys {
    /// Number of keys on the board
    pub const COUNT: usize = 4;

    /// MIDI note per key (C4, D4, E4, F4)
    pub const NOTES: [u8; COUNT] = [60, 62, 64, 65];

    /// Consecutive identical samples needed before a level change is accepted
    pub const DEBOUNCE_SAMPLES: u8 = 3;

    /// Key polling interval
    pub const SCAN_INTERVAL_MS: u64 = 5;
}
