//! Embassy tasks module
//!
//! Contains all async tasks for the firmware, organised by functionality.

pub mod ble;
pub mod keys;
pub mod led;

pub use ble::ble_task;
pub use keys::{keys_task, NoteReceiver, NoteSender, NOTE_CHANNEL};
pub use led::{led_task, LedReceiver, LedSender, LED_CHANNEL};
