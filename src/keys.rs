//! Debounced key bank mapped to MIDI notes
//!
//! Raw pin samples go in, note messages come out. A key only changes
//! state after the new level has been seen on `DEBOUNCE_SAMPLES`
//! consecutive samples.

use crate::config::keys::DEBOUNCE_SAMPLES;
use crate::config::midi::DEFAULT_VELOCITY;
use crate::midi::MidiMessage;
use heapless::Vec;

#[derive(Debug, Clone, Copy, Default)]
struct KeyState {
    /// Debounced level
    pressed: bool,
    /// Consecutive samples disagreeing with `pressed`
    pending: u8,
}

/// Scanner for `N` keys
pub struct KeyScanner<const N: usize> {
    notes: [u8; N],
    keys: [KeyState; N],
    velocity: u8,
}

impl<const N: usize> KeyScanner<N> {
    /// Create a scanner with one note per key, all keys released.
    pub fn new(notes: [u8; N]) -> Self {
        Self {
            notes,
            keys: [KeyState::default(); N],
            velocity: DEFAULT_VELOCITY,
        }
    }

    /// Use a different Note On velocity.
    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity & 0x7F;
        self
    }

    /// Debounced state of a key, `None` for an out-of-range index.
    pub fn is_pressed(&self, index: usize) -> Option<bool> {
        self.keys.get(index).map(|k| k.pressed)
    }

    /// Feed one raw sample for a key.
    ///
    /// Returns a message when the debounced state changes.
    pub fn sample(&mut self, index: usize, pressed: bool) -> Option<MidiMessage> {
        let note = *self.notes.get(index)?;
        let key = self.keys.get_mut(index)?;

        if pressed == key.pressed {
            key.pending = 0;
            return None;
        }

        key.pending += 1;
        if key.pending < DEBOUNCE_SAMPLES {
            return None;
        }

        key.pressed = pressed;
        key.pending = 0;
        Some(if pressed {
            MidiMessage::NoteOn {
                note,
                velocity: self.velocity,
            }
        } else {
            MidiMessage::NoteOff { note }
        })
    }

    /// Feed one raw sample for every key, in key order.
    pub fn scan(&mut self, levels: [bool; N]) -> Vec<MidiMessage, N> {
        let mut messages = Vec::new();
        for (index, pressed) in levels.into_iter().enumerate() {
            if let Some(message) = self.sample(index, pressed) {
                // At most one message per key, so this never overflows
                let _ = messages.push(message);
            }
        }
        messages
    }
}

/// Whether `message` may be discarded when the outgoing queue is full.
///
/// Releases are always kept so a press that reached the central is
/// followed by its release.
pub fn may_drop(message: &MidiMessage) -> bool {
    matches!(message, MidiMessage::NoteOn { .. })
}
