//! Bridge between TrouBLE GATT events and the MIDI service callbacks

use trouble_host::prelude::*;

use crate::ble::service::{MidiValue, Server};
use crate::config::ble::MIDI_VALUE_SIZE;
use crate::gatt::{
    AccessError, AccessOp, AttrHandle, BindError, ConnHandle, GattCallbacks, MidiService,
    NotificationSink, NotifyError, SubscribeEvent, MIDI_SERVICE_TABLE,
};
use crate::midi::MidiMessage;

/// Map an access error to the ATT error code TrouBLE sends back
fn att_error(error: AccessError) -> AttErrorCode {
    match error {
        AccessError::InvalidAttributeValueLength => AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH,
        AccessError::Unlikely => AttErrorCode::UNLIKELY_ERROR,
        AccessError::InsufficientResources => AttErrorCode::INSUFFICIENT_RESOURCES,
    }
}

/// Bind the handles TrouBLE assigned to the MIDI service.
///
/// TrouBLE lays the service out like [`MIDI_SERVICE_TABLE`]: service
/// declaration, characteristic declaration, value, CCCD. The table is
/// registered so that its value handle is TrouBLE's, and binding fails if
/// the CCCD does not line up as well.
pub fn bind_handles(server: &Server<'_>, service: &mut MidiService) -> Result<(), BindError> {
    let io = &server.midi.io;
    service
        .bind_host_handles(&MIDI_SERVICE_TABLE, io.handle, io.cccd_handle)
        .inspect_err(|e| {
            log::error!(
                "MIDI handles do not match host val={} cccd={:?}: {:?}",
                io.handle,
                io.cccd_handle,
                e
            );
        })
}

/// Copy the service's value into the attribute table so reads serve it.
fn sync_value(server: &Server<'_>, value: &[u8]) {
    let mut stored = MidiValue::new();
    if stored.extend_from_slice(value).is_err() || server.set(&server.midi.io, &stored).is_err() {
        log::warn!("failed to update MIDI characteristic value");
    }
}

/// Handle one GATT event on the connection `conn_handle`.
///
/// `cccd_state` holds the last CCCD value written by this peer. Returns the
/// note message carried by a successful write, if any.
pub fn handle_gatt_event<P: PacketPool>(
    server: &Server<'_>,
    service: &mut MidiService,
    conn_handle: ConnHandle,
    cccd_state: &mut u16,
    event: GattEvent<'_, '_, P>,
) -> Option<MidiMessage> {
    match event {
        GattEvent::Write(write_event) => {
            let handle = write_event.handle();

            if Some(handle) == service.cccd_handle() {
                let subscribe = SubscribeEvent::from_cccd_write(
                    conn_handle,
                    handle,
                    *cccd_state,
                    write_event.data(),
                );
                *cccd_state = subscribe.cccd_value();
                service.on_subscribe(&subscribe);
                let _ = write_event.accept();
                return None;
            }

            if Some(handle) != service.value_handle() {
                let _ = write_event.accept();
                return None;
            }

            let data = write_event.data();
            let mut out: heapless::Vec<u8, 0> = heapless::Vec::new();
            match service.access(conn_handle, handle, AccessOp::WriteCharacteristic(data), &mut out) {
                Ok(()) => {
                    let message = MidiMessage::from_packet(data).ok();
                    let _ = write_event.accept();
                    sync_value(server, service.value());
                    message
                }
                Err(e) => {
                    log::warn!("rejecting MIDI write of {} bytes: {:?}", data.len(), e);
                    let _ = write_event.reject(att_error(e));
                    None
                }
            }
        }
        GattEvent::Read(read_event) => {
            let handle = read_event.handle();
            if Some(handle) == service.value_handle() {
                let mut out: heapless::Vec<u8, MIDI_VALUE_SIZE> = heapless::Vec::new();
                match service.access(conn_handle, handle, AccessOp::ReadCharacteristic, &mut out) {
                    Ok(()) => sync_value(server, &out),
                    Err(e) => {
                        let _ = read_event.reject(att_error(e));
                        return None;
                    }
                }
            }
            let _ = read_event.accept();
            None
        }
        GattEvent::Other(other_event) => {
            let _ = other_event.accept();
            None
        }
    }
}

/// Sends notifications on the MIDI characteristic of one connection
pub struct TroubleNotifier<'a, 'stack, 'server, P: PacketPool> {
    characteristic: &'a Characteristic<MidiValue>,
    conn: &'a GattConnection<'stack, 'server, P>,
}

impl<'a, 'stack, 'server, P: PacketPool> TroubleNotifier<'a, 'stack, 'server, P> {
    pub fn new(
        characteristic: &'a Characteristic<MidiValue>,
        conn: &'a GattConnection<'stack, 'server, P>,
    ) -> Self {
        Self {
            characteristic,
            conn,
        }
    }
}

impl<P: PacketPool> NotificationSink for TroubleNotifier<'_, '_, '_, P> {
    async fn notify(
        &mut self,
        conn_handle: ConnHandle,
        attr_handle: AttrHandle,
        payload: &[u8],
    ) -> Result<(), NotifyError> {
        if self.conn.raw().handle().raw() != conn_handle {
            return Err(NotifyError::NotConnected);
        }
        if self.characteristic.handle != attr_handle {
            return Err(NotifyError::HostError);
        }

        let value = MidiValue::from_slice(payload).map_err(|_| NotifyError::OutOfBuffers)?;
        self.characteristic
            .notify(self.conn, &value)
            .await
            .map_err(|_| NotifyError::HostError)
    }
}
