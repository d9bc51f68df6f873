//! Bluetooth Low Energy module
//!
//! Exposes the BLE-MIDI service through TrouBLE and bridges its GATT
//! events into the host-agnostic [`crate::gatt`] layer.

pub mod adapter;
pub mod service;

pub use adapter::{bind_handles, handle_gatt_event, TroubleNotifier};
pub use service::{MidiGattService, MidiValue, Server};
