//! BLE task for the BLE-MIDI service
//!
//! Implements the BLE host task that manages connections, feeds GATT
//! events to the MIDI service and sends key notes as notifications.

use embassy_futures::select::{select, Either};
use trouble_host::prelude::*;

use crate::ble::{bind_handles, handle_gatt_event, Server, TroubleNotifier};
use crate::config::ble::{
    ADDRESS_SUFFIX, CONNECTIONS_MAX, DEVICE_NAME, L2CAP_CHANNELS_MAX, MIDI_SERVICE_UUID,
};
use crate::gatt::{GattCallbacks, MidiService};

use super::keys::NoteReceiver;
use super::led::LedSender;

/// Format device ID bytes as uppercase hex after the device name
/// Returns the formatted string slice
fn format_device_name<'a>(buf: &'a mut [u8; 20], device_id: &[u8; 3]) -> &'a str {
    const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";
    let prefix = DEVICE_NAME.as_bytes();

    // Copy prefix and separator
    buf[..prefix.len()].copy_from_slice(prefix);
    buf[prefix.len()] = b'-';

    // Format 3 bytes as 6 hex characters
    let mut pos = prefix.len() + 1;
    for &byte in device_id {
        buf[pos] = HEX_CHARS[(byte >> 4) as usize];
        buf[pos + 1] = HEX_CHARS[(byte & 0x0F) as usize];
        pos += 2;
    }

    // All bytes are ASCII, so this will always succeed
    core::str::from_utf8(&buf[..pos]).unwrap_or(DEVICE_NAME)
}

/// Main BLE task that manages the Bluetooth stack and connections
///
/// This task:
/// 1. Initialises the BLE controller and binds the MIDI handles
/// 2. Starts advertising as "BLE-MIDI-XXXXXX" with the MIDI service UUID
/// 3. Forwards GATT events of the connection to the MIDI service
/// 4. Sends notes from the key channel as notifications
/// 5. Passes notes received from the central to the LED task
pub async fn ble_task<C: Controller>(
    controller: C,
    device_id: [u8; 3],
    notes: NoteReceiver,
    led_sender: LedSender,
) {
    let mut device_name_buf = [0u8; 20];
    let device_name = format_device_name(&mut device_name_buf, &device_id);

    log::info!("BLE: Starting as '{}'", device_name);

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    // Build the BLE stack with address derived from device ID
    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random([
        device_id[0],
        device_id[1],
        device_id[2],
        ADDRESS_SUFFIX[0],
        ADDRESS_SUFFIX[1],
        ADDRESS_SUFFIX[2],
    ]));

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: device_name,
        appearance: &appearance::UNKNOWN,
    });
    let server: Server = match Server::new_with_config(gap) {
        Ok(s) => s,
        Err(e) => {
            log::error!("BLE: GATT server setup failed: {:?}", e);
            return;
        }
    };

    let mut service = MidiService::new();
    if bind_handles(&server, &mut service).is_err() {
        return;
    }

    let runner_task = runner.run();

    let peripheral_task = async {
        // Service UUID goes in the advertisement, the name in the scan response
        let service_uuid = MIDI_SERVICE_UUID.as_u128().to_le_bytes();
        let mut adv_data = [0u8; 31];
        let adv_len = match AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::ServiceUuids128(&[service_uuid]),
            ],
            &mut adv_data,
        ) {
            Ok(l) => l,
            Err(_) => return,
        };
        let mut scan_data = [0u8; 31];
        let scan_len = match AdStructure::encode_slice(
            &[AdStructure::CompleteLocalName(device_name.as_bytes())],
            &mut scan_data,
        ) {
            Ok(l) => l,
            Err(_) => return,
        };

        loop {
            log::info!("BLE: Advertising...");
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..adv_len],
                        scan_data: &scan_data[..scan_len],
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(_) => continue,
            };

            let acceptor = match advertiser.accept().await {
                Ok(a) => a,
                Err(_) => continue,
            };

            let conn = match acceptor.with_attribute_server(&*server) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let conn_handle = conn.raw().handle().raw();
            log::info!("BLE: Connected, conn_handle={}", conn_handle);

            // Notes played while nobody was connected are stale
            let mut stale = 0usize;
            while notes.try_receive().is_ok() {
                stale += 1;
            }
            if stale > 0 {
                log::debug!("BLE: Discarded {} queued notes", stale);
            }

            // CCCD value last written by this peer
            let mut cccd_state: u16 = 0;

            loop {
                match select(conn.next(), notes.receive()).await {
                    Either::First(GattConnectionEvent::Disconnected { reason }) => {
                        log::info!("BLE: Disconnected, reason={:?}", reason);
                        service.on_disconnect(conn_handle);
                        break;
                    }
                    Either::First(GattConnectionEvent::Gatt { event }) => {
                        let received =
                            handle_gatt_event(&server, &mut service, conn_handle, &mut cccd_state, event);
                        if let Some(message) = received {
                            log::debug!("BLE: Received {:?}", message);
                            let _ = led_sender.try_send(message);
                        }
                    }
                    Either::First(_) => {}
                    Either::Second(message) => {
                        let mut notifier = TroubleNotifier::new(&server.midi.io, &conn);
                        service.send(&mut notifier, message).await;
                    }
                }
            }
        }
    };

    select(runner_task, peripheral_task).await;
}
