//! LED task for non-blocking LED control
//!
//! Flashes the LED for every Note On the central sends to the device.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use esp_hal::gpio::Output;

use crate::config::led::FLASH_MS;
use crate::midi::MidiMessage;

/// Type alias for the LED channel sender
pub type LedSender = Sender<'static, CriticalSectionRawMutex, MidiMessage, 4>;

/// Type alias for the LED channel receiver
pub type LedReceiver = Receiver<'static, CriticalSectionRawMutex, MidiMessage, 4>;

/// Channel for notes received from the central
pub static LED_CHANNEL: Channel<CriticalSectionRawMutex, MidiMessage, 4> = Channel::new();

/// Task that flashes the LED without blocking other operations
pub async fn led_task(mut led: Output<'static>, receiver: LedReceiver) {
    loop {
        let message = receiver.receive().await;
        if !matches!(message, MidiMessage::NoteOn { .. }) {
            continue;
        }

        // Flash LED (turn off then back on, since active low)
        led.set_high(); // LED off
        embassy_time::Timer::after(embassy_time::Duration::from_millis(FLASH_MS)).await;
        led.set_low(); // LED on
    }
}
