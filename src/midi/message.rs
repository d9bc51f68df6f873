//! Note messages and their BLE-MIDI packet format
//!
//! # Packet Format
//!
//! ```text
//! [header: 0x80 | ts_hi][timestamp: 0x80 | ts_lo][status][note][velocity]
//! ```
//!
//! The device does not track time, so both timestamp fields are zero and
//! every packet starts with `0x80 0x80`.

use crate::config::midi::{
    NOTE_PACKET_LEN, PACKET_HEADER, PACKET_TIMESTAMP, STATUS_NOTE_OFF, STATUS_NOTE_ON,
};

/// Errors that can occur while decoding a BLE-MIDI packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiError {
    /// Fewer bytes than a single note message needs
    TooShort,
    /// Header byte does not have bit 7 set
    InvalidHeader,
    /// Timestamp byte does not have bit 7 set
    InvalidTimestamp,
    /// Status byte is not a note message
    UnsupportedStatus(u8),
    /// Note or velocity byte has bit 7 set
    InvalidData,
}

/// A note message on channel 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Key pressed
    NoteOn { note: u8, velocity: u8 },
    /// Key released
    NoteOff { note: u8 },
}

impl MidiMessage {
    /// Encode as a single-message BLE-MIDI packet.
    ///
    /// Note Off is always sent with a release velocity of zero.
    pub fn to_packet(&self) -> [u8; NOTE_PACKET_LEN] {
        match *self {
            Self::NoteOn { note, velocity } => {
                [PACKET_HEADER, PACKET_TIMESTAMP, STATUS_NOTE_ON, note, velocity]
            }
            Self::NoteOff { note } => [PACKET_HEADER, PACKET_TIMESTAMP, STATUS_NOTE_OFF, note, 0],
        }
    }

    /// Decode the first message of a BLE-MIDI packet.
    ///
    /// Any channel is accepted. A Note On with zero velocity is treated as
    /// Note Off. Bytes after the first message are ignored.
    pub fn from_packet(packet: &[u8]) -> Result<Self, MidiError> {
        if packet.len() < NOTE_PACKET_LEN {
            return Err(MidiError::TooShort);
        }
        if packet[0] & 0x80 == 0 {
            return Err(MidiError::InvalidHeader);
        }
        if packet[1] & 0x80 == 0 {
            return Err(MidiError::InvalidTimestamp);
        }

        let status = packet[2];
        let (note, velocity) = (packet[3], packet[4]);
        if note & 0x80 != 0 || velocity & 0x80 != 0 {
            return Err(MidiError::InvalidData);
        }

        match status & 0xF0 {
            STATUS_NOTE_ON if velocity > 0 => Ok(Self::NoteOn { note, velocity }),
            STATUS_NOTE_ON | STATUS_NOTE_OFF => Ok(Self::NoteOff { note }),
            _ => Err(MidiError::UnsupportedStatus(status)),
        }
    }
}
