//! MIDI message handling
//!
//! Encodes note messages into BLE-MIDI packets and decodes the packets
//! a central writes to the MIDI characteristic.

pub mod message;

pub use message::{MidiError, MidiMessage};
