//! Key scanning task
//!
//! Polls the key bank, debounces it and queues note messages for the
//! BLE task to send.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::InputPin;

use crate::config::keys::SCAN_INTERVAL_MS;
use crate::keys::{may_drop, KeyScanner};
use crate::midi::MidiMessage;

/// Channel capacity for outgoing notes
const NOTE_CHANNEL_SIZE: usize = 8;

/// Type alias for the note channel sender
pub type NoteSender = Sender<'static, CriticalSectionRawMutex, MidiMessage, NOTE_CHANNEL_SIZE>;

/// Type alias for the note channel receiver
pub type NoteReceiver = Receiver<'static, CriticalSectionRawMutex, MidiMessage, NOTE_CHANNEL_SIZE>;

/// Notes produced by the keys, consumed by the BLE task
pub static NOTE_CHANNEL: Channel<CriticalSectionRawMutex, MidiMessage, NOTE_CHANNEL_SIZE> =
    Channel::new();

/// Task that scans the keys and queues note messages
///
/// Keys are active low. While no central is connected the channel fills
/// up. A full channel drops Note On, but a Note Off waits for room so its
/// Note On is never left hanging.
pub async fn keys_task<P: InputPin, const N: usize>(
    mut pins: [P; N],
    notes: [u8; N],
    sender: NoteSender,
) {
    let mut scanner = KeyScanner::new(notes);

    loop {
        let mut levels = [false; N];
        for (level, pin) in levels.iter_mut().zip(pins.iter_mut()) {
            *level = pin.is_low().unwrap_or(false);
        }

        for message in scanner.scan(levels) {
            if sender.try_send(message).is_ok() {
                continue;
            }
            if may_drop(&message) {
                log::debug!("note channel full, dropping {:?}", message);
            } else {
                sender.send(message).await;
            }
        }

        Timer::after(Duration::from_millis(SCAN_INTERVAL_MS)).await;
    }
}
