//! BLE-MIDI service definition
//!
//! - Service UUID: 03B80E5A-EDE8-4B33-A751-6CE34EC4C700
//! - MIDI I/O Characteristic: 7772E5DB-3868-4112-A1A9-F2669D106BF3
//!   (read, write without response, notify)

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use trouble_host::prelude::*;

use crate::config::ble::MIDI_VALUE_SIZE;

/// Characteristic value as stored in the attribute table
pub type MidiValue = heapless::Vec<u8, MIDI_VALUE_SIZE>;

/// BLE-MIDI Service
///
/// The central writes BLE-MIDI packets to `io` and receives note messages
/// from the device as notifications on the same characteristic.
#[gatt_service(uuid = "03b80e5a-ede8-4b33-a751-6ce34ec4c700")]
pub struct MidiGattService {
    /// MIDI I/O Characteristic
    #[characteristic(uuid = "7772e5db-3868-4112-a1a9-f2669d106bf3", read, write_without_response, notify)]
    pub io: MidiValue,
}

/// BLE GATT Server with the BLE-MIDI service
#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct Server {
    pub midi: MidiGattService,
}
