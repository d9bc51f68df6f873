//! BLE-MIDI service state and callbacks
//!
//! Holds the characteristic value, the handles bound during registration
//! and the single tracked subscriber. Note messages are only sent while a
//! peer has notifications enabled on the MIDI characteristic.

use core::fmt;

use heapless::Vec;

use crate::config::ble::{MIDI_CHARACTERISTIC_UUID, MIDI_VALUE_SIZE};
use crate::gatt::table::{RegisterError, ServiceTable};
use crate::gatt::traits::{GattCallbacks, NotificationSink};
use crate::gatt::types::{
    att_flags, AccessError, AccessOp, AttUuid, AttrHandle, ConnHandle, RegisterEvent,
    SubscribeEvent,
};
use crate::gatt::value::CharacteristicValue;
use crate::midi::MidiMessage;

/// Subscriber tracked by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// No peer has notifications enabled
    Unsubscribed,
    /// Notifications go to this connection
    Subscribed {
        conn_handle: ConnHandle,
        /// Peer also asked for indications
        indicate: bool,
    },
}

/// Failure to line up the table with the handles the host assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// The table could not be registered at the derived first handle
    Register(RegisterError),
    /// Registration bound different handles than the host uses
    Mismatch {
        val_handle: Option<AttrHandle>,
        cccd_handle: Option<AttrHandle>,
    },
}

/// Hex dump of a byte slice for log output
struct HexBytes<'a>(&'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// The BLE-MIDI GATT service
pub struct MidiService {
    value: CharacteristicValue<MIDI_VALUE_SIZE>,
    val_handle: Option<AttrHandle>,
    cccd_handle: Option<AttrHandle>,
    subscription: Subscription,
}

impl MidiService {
    /// Create an unregistered service with a zeroed value.
    pub const fn new() -> Self {
        Self {
            value: CharacteristicValue::new(),
            val_handle: None,
            cccd_handle: None,
            subscription: Subscription::Unsubscribed,
        }
    }

    /// Characteristic value handle, once registered
    pub fn value_handle(&self) -> Option<AttrHandle> {
        self.val_handle
    }

    /// CCCD handle, once registered
    pub fn cccd_handle(&self) -> Option<AttrHandle> {
        self.cccd_handle
    }

    pub fn subscription(&self) -> Subscription {
        self.subscription
    }

    /// Current characteristic value
    pub fn value(&self) -> &[u8; MIDI_VALUE_SIZE] {
        self.value.as_bytes()
    }

    /// Register `table` so the MIDI value lands on the host's `val_handle`.
    ///
    /// The value of the first characteristic sits two handles after the
    /// service declaration. Fails unless the bound value and CCCD handles
    /// are exactly the ones the host reports.
    pub fn bind_host_handles(
        &mut self,
        table: &ServiceTable,
        val_handle: AttrHandle,
        cccd_handle: Option<AttrHandle>,
    ) -> Result<(), BindError> {
        let first = val_handle
            .checked_sub(2)
            .ok_or(BindError::Register(RegisterError::InvalidFirstHandle))?;
        table.register(first, self).map_err(BindError::Register)?;

        if self.val_handle != Some(val_handle) || self.cccd_handle != cccd_handle {
            return Err(BindError::Mismatch {
                val_handle: self.val_handle,
                cccd_handle: self.cccd_handle,
            });
        }
        Ok(())
    }

    /// Send a Note On to the subscriber.
    ///
    /// Returns false without sending if nobody is subscribed.
    pub async fn send_note_on<S: NotificationSink>(
        &self,
        sink: &mut S,
        note: u8,
        velocity: u8,
    ) -> bool {
        self.send(sink, MidiMessage::NoteOn { note, velocity }).await
    }

    /// Send a Note Off to the subscriber.
    ///
    /// Returns false without sending if nobody is subscribed.
    pub async fn send_note_off<S: NotificationSink>(&self, sink: &mut S, note: u8) -> bool {
        self.send(sink, MidiMessage::NoteOff { note }).await
    }

    /// Send any note message to the subscriber.
    ///
    /// Delivery is not confirmed. Host errors are logged and dropped.
    pub async fn send<S: NotificationSink>(&self, sink: &mut S, message: MidiMessage) -> bool {
        let (Subscription::Subscribed { conn_handle, .. }, Some(val_handle)) =
            (self.subscription, self.val_handle)
        else {
            return false;
        };

        let packet = message.to_packet();
        if let Err(e) = sink.notify(conn_handle, val_handle, &packet).await {
            log::warn!(
                "MIDI notify to conn_handle={} failed: {:?}",
                conn_handle,
                e
            );
        }
        true
    }

    fn bind_value_handle(&mut self, handle: AttrHandle) {
        match self.val_handle {
            None => self.val_handle = Some(handle),
            Some(bound) if bound != handle => {
                log::warn!(
                    "ignoring MIDI value handle {}, already bound to {}",
                    handle,
                    bound
                );
            }
            Some(_) => {}
        }
    }

    fn bind_cccd_handle(&mut self, handle: AttrHandle) {
        match self.cccd_handle {
            None => self.cccd_handle = Some(handle),
            Some(bound) if bound != handle => {
                log::warn!("ignoring CCCD handle {}, already bound to {}", handle, bound);
            }
            Some(_) => {}
        }
    }

    fn is_midi_attribute(&self, handle: AttrHandle) -> bool {
        self.val_handle == Some(handle) || self.cccd_handle == Some(handle)
    }
}

impl Default for MidiService {
    fn default() -> Self {
        Self::new()
    }
}

impl GattCallbacks for MidiService {
    fn access<const M: usize>(
        &mut self,
        conn_handle: ConnHandle,
        _attr_handle: AttrHandle,
        op: AccessOp<'_>,
        out: &mut Vec<u8, M>,
    ) -> Result<(), AccessError> {
        match op {
            AccessOp::ReadCharacteristic => self.value.read_into(out),
            AccessOp::WriteCharacteristic(data) => {
                let len = self.value.write(data)?;
                log::info!(
                    "Received MIDI data (conn_handle={} len={}): {}",
                    conn_handle,
                    len,
                    HexBytes(data)
                );
                Ok(())
            }
            AccessOp::ReadDescriptor | AccessOp::WriteDescriptor(_) => Err(AccessError::Unlikely),
        }
    }

    fn on_register(&mut self, event: &RegisterEvent) {
        match *event {
            RegisterEvent::Service { uuid, handle } => {
                log::info!("registered service {} with handle={}", uuid, handle);
            }
            RegisterEvent::Characteristic {
                uuid,
                def_handle,
                val_handle,
            } => {
                log::info!(
                    "registering characteristic {} with def_handle={} val_handle={}",
                    uuid,
                    def_handle,
                    val_handle
                );
                if uuid == AttUuid::Uuid128(MIDI_CHARACTERISTIC_UUID) {
                    self.bind_value_handle(val_handle);
                }
            }
            RegisterEvent::Descriptor {
                uuid,
                handle,
                att_flags: flags,
            } => {
                log::info!("registering descriptor {} with handle={}", uuid, handle);
                let rw = att_flags::READ | att_flags::WRITE;
                if flags & rw == rw {
                    self.bind_cccd_handle(handle);
                }
            }
        }
    }

    fn on_subscribe(&mut self, event: &SubscribeEvent) {
        match event.conn_handle {
            Some(conn_handle) => log::info!(
                "subscribe event; conn_handle={} attr_handle={}",
                conn_handle,
                event.attr_handle
            ),
            None => log::info!("subscribe by host stack; attr_handle={}", event.attr_handle),
        }
        log::debug!(
            "subscribe event; attr_handle={} val_handle={:?} cccd_handle={:?}",
            event.attr_handle,
            self.val_handle,
            self.cccd_handle
        );

        if !self.is_midi_attribute(event.attr_handle) {
            return;
        }

        self.subscription = match (event.conn_handle, event.cur_notify) {
            (Some(conn_handle), true) => Subscription::Subscribed {
                conn_handle,
                indicate: event.cur_indicate,
            },
            _ => Subscription::Unsubscribed,
        };
        log::info!(
            "MIDI notifications {}",
            if event.cur_notify { "enabled" } else { "disabled" }
        );
    }

    fn on_disconnect(&mut self, conn_handle: ConnHandle) {
        if let Subscription::Subscribed {
            conn_handle: tracked,
            ..
        } = self.subscription
        {
            if tracked == conn_handle {
                self.subscription = Subscription::Unsubscribed;
                log::info!(
                    "MIDI subscriber conn_handle={} disconnected, notifications disabled",
                    conn_handle
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ble::FIRST_HANDLE;
    use crate::gatt::table::MIDI_SERVICE_TABLE;
    use crate::gatt::traits::mock::MockNotificationSink;
    use crate::gatt::types::NotifyError;

    const CONN: ConnHandle = 1;

    /// Service registered from the static table (value=3, cccd=4)
    fn registered_service() -> MidiService {
        let mut service = MidiService::new();
        MIDI_SERVICE_TABLE
            .register(FIRST_HANDLE, &mut service)
            .unwrap();
        service
    }

    fn subscribe(conn_handle: Option<ConnHandle>, attr_handle: AttrHandle, enabled: bool) -> SubscribeEvent {
        SubscribeEvent {
            conn_handle,
            attr_handle,
            prev_notify: !enabled,
            cur_notify: enabled,
            prev_indicate: false,
            cur_indicate: false,
        }
    }

    fn read(service: &mut MidiService) -> Vec<u8, MIDI_VALUE_SIZE> {
        let mut out = Vec::new();
        service
            .access(CONN, 3, AccessOp::ReadCharacteristic, &mut out)
            .unwrap();
        out
    }

    fn write(service: &mut MidiService, data: &[u8]) -> Result<(), AccessError> {
        let mut out: Vec<u8, 0> = Vec::new();
        service.access(CONN, 3, AccessOp::WriteCharacteristic(data), &mut out)
    }

    #[test]
    fn test_registration_binds_handles() {
        let service = registered_service();

        assert_eq!(service.value_handle(), Some(3));
        assert_eq!(service.cccd_handle(), Some(4));
        assert_eq!(service.subscription(), Subscription::Unsubscribed);
    }

    #[test]
    fn test_handles_are_bound_once() {
        let mut service = registered_service();

        service.on_register(&RegisterEvent::Characteristic {
            uuid: AttUuid::Uuid128(MIDI_CHARACTERISTIC_UUID),
            def_handle: 20,
            val_handle: 21,
        });
        service.on_register(&RegisterEvent::Descriptor {
            uuid: AttUuid::Uuid16(0x2902),
            handle: 22,
            att_flags: att_flags::READ | att_flags::WRITE,
        });

        assert_eq!(service.value_handle(), Some(3));
        assert_eq!(service.cccd_handle(), Some(4));
    }

    #[test]
    fn test_other_characteristic_not_bound() {
        let mut service = MidiService::new();
        service.on_register(&RegisterEvent::Characteristic {
            uuid: AttUuid::Uuid16(0x2A19),
            def_handle: 2,
            val_handle: 3,
        });

        assert_eq!(service.value_handle(), None);
    }

    #[test]
    fn test_read_only_descriptor_not_cccd() {
        let mut service = MidiService::new();
        service.on_register(&RegisterEvent::Descriptor {
            uuid: AttUuid::Uuid16(0x2901),
            handle: 5,
            att_flags: att_flags::READ,
        });

        assert_eq!(service.cccd_handle(), None);
    }

    #[test]
    fn test_initial_read_is_zeroed() {
        let mut service = registered_service();
        let out = read(&mut service);

        assert_eq!(out.len(), MIDI_VALUE_SIZE);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_then_read_back() {
        let mut service = registered_service();
        write(&mut service, &[0x80, 0x80, 0x90, 60, 100]).unwrap();

        let out = read(&mut service);
        assert_eq!(out.len(), MIDI_VALUE_SIZE);
        assert_eq!(&out[..5], &[0x80, 0x80, 0x90, 60, 100]);
        assert!(out[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shorter_write_keeps_previous_tail() {
        let mut service = registered_service();
        write(&mut service, &[0x11; 8]).unwrap();
        write(&mut service, &[0x22; 3]).unwrap();

        let out = read(&mut service);
        assert_eq!(&out[..3], &[0x22; 3]);
        assert_eq!(&out[3..8], &[0x11; 5]);
        assert_eq!(out[8], 0);
    }

    #[test]
    fn test_full_size_write() {
        let mut service = registered_service();
        let mut data = [0u8; MIDI_VALUE_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }

        write(&mut service, &data).unwrap();
        assert_eq!(read(&mut service).as_slice(), &data[..]);
    }

    #[test]
    fn test_oversize_write_rejected() {
        let mut service = registered_service();
        write(&mut service, &[0x42; 4]).unwrap();

        let data = [0xFF; MIDI_VALUE_SIZE + 1];
        assert_eq!(
            write(&mut service, &data),
            Err(AccessError::InvalidAttributeValueLength)
        );

        let out = read(&mut service);
        assert_eq!(&out[..4], &[0x42; 4]);
        assert!(out[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_into_short_buffer_fails() {
        let mut service = registered_service();
        let mut out: Vec<u8, 64> = Vec::new();

        assert_eq!(
            service.access(CONN, 3, AccessOp::ReadCharacteristic, &mut out),
            Err(AccessError::InsufficientResources)
        );
    }

    #[test]
    fn test_descriptor_access_unlikely() {
        let mut service = registered_service();
        let mut out: Vec<u8, 8> = Vec::new();

        assert_eq!(
            service.access(CONN, 4, AccessOp::ReadDescriptor, &mut out),
            Err(AccessError::Unlikely)
        );
        assert_eq!(
            service.access(CONN, 4, AccessOp::WriteDescriptor(&[1, 0]), &mut out),
            Err(AccessError::Unlikely)
        );
    }

    #[test]
    fn test_senders_noop_before_subscription() {
        let service = registered_service();
        let mut sink = MockNotificationSink::new();

        futures::executor::block_on(async {
            assert!(!service.send_note_on(&mut sink, 60, 100).await);
            assert!(!service.send_note_off(&mut sink, 60).await);
        });

        assert!(sink.get_history().is_empty());
    }

    #[test]
    fn test_note_on_and_off_after_subscribe() {
        let mut service = registered_service();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));
        assert_eq!(
            service.subscription(),
            Subscription::Subscribed {
                conn_handle: CONN,
                indicate: false
            }
        );

        futures::executor::block_on(async {
            assert!(service.send_note_on(&mut sink, 60, 100).await);
            assert!(service.send_note_off(&mut sink, 60).await);
        });

        let history = sink.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].conn_handle, CONN);
        assert_eq!(history[0].attr_handle, 3);
        assert_eq!(history[0].payload.as_slice(), &[0x80, 0x80, 0x90, 60, 100]);
        assert_eq!(history[1].attr_handle, 3);
        assert_eq!(history[1].payload.as_slice(), &[0x80, 0x80, 0x80, 60, 0]);
    }

    #[test]
    fn test_subscribe_through_cccd_handle() {
        let mut service = registered_service();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(CONN), 4, true));

        futures::executor::block_on(async {
            assert!(service.send_note_on(&mut sink, 64, 1).await);
        });

        // Notifications always target the value handle
        assert_eq!(sink.get_history()[0].attr_handle, 3);
    }

    #[test]
    fn test_unsubscribe_reverts_to_noop() {
        let mut service = registered_service();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));
        service.on_subscribe(&subscribe(Some(CONN), 3, false));
        assert_eq!(service.subscription(), Subscription::Unsubscribed);

        futures::executor::block_on(async {
            assert!(!service.send_note_on(&mut sink, 60, 100).await);
            assert!(!service.send_note_off(&mut sink, 60).await);
        });

        assert!(sink.get_history().is_empty());
    }

    #[test]
    fn test_unrelated_attribute_ignored() {
        let mut service = registered_service();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));
        service.on_subscribe(&subscribe(Some(CONN), 42, false));

        assert_eq!(
            service.subscription(),
            Subscription::Subscribed {
                conn_handle: CONN,
                indicate: false
            }
        );

        let mut fresh = registered_service();
        fresh.on_subscribe(&subscribe(Some(CONN), 42, true));
        assert_eq!(fresh.subscription(), Subscription::Unsubscribed);
    }

    #[test]
    fn test_second_subscriber_replaces_first() {
        let mut service = registered_service();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(1), 3, true));
        service.on_subscribe(&subscribe(Some(2), 3, true));

        futures::executor::block_on(async {
            service.send_note_on(&mut sink, 60, 100).await;
        });

        let history = sink.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].conn_handle, 2);
    }

    #[test]
    fn test_indicate_flag_recorded() {
        let mut service = registered_service();
        let mut event = subscribe(Some(CONN), 4, true);
        event.cur_indicate = true;

        service.on_subscribe(&event);

        assert_eq!(
            service.subscription(),
            Subscription::Subscribed {
                conn_handle: CONN,
                indicate: true
            }
        );
    }

    #[test]
    fn test_host_initiated_subscribe_not_tracked() {
        let mut service = registered_service();

        service.on_subscribe(&subscribe(None, 3, true));

        assert_eq!(service.subscription(), Subscription::Unsubscribed);
    }

    #[test]
    fn test_disconnect_of_subscriber_clears_state() {
        let mut service = registered_service();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));
        service.on_disconnect(CONN);

        assert_eq!(service.subscription(), Subscription::Unsubscribed);
        futures::executor::block_on(async {
            assert!(!service.send_note_on(&mut sink, 60, 100).await);
        });
        assert!(sink.get_history().is_empty());
    }

    #[test]
    fn test_disconnect_of_other_connection_keeps_state() {
        let mut service = registered_service();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));
        service.on_disconnect(CONN + 1);

        assert_eq!(
            service.subscription(),
            Subscription::Subscribed {
                conn_handle: CONN,
                indicate: false
            }
        );
    }

    #[test]
    fn test_unregistered_service_never_sends() {
        let mut service = MidiService::new();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));

        futures::executor::block_on(async {
            assert!(!service.send_note_on(&mut sink, 60, 100).await);
        });
        assert!(sink.get_history().is_empty());
    }

    #[test]
    fn test_notify_error_is_swallowed() {
        let mut service = registered_service();
        let mut sink = MockNotificationSink::new();

        service.on_subscribe(&subscribe(Some(CONN), 3, true));

        futures::executor::block_on(async {
            sink.set_next_error(NotifyError::OutOfBuffers);
            assert!(service.send_note_on(&mut sink, 60, 100).await);
            // No retry, next message goes out normally
            assert!(service.send_note_off(&mut sink, 60).await);
        });

        let history = sink.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].payload.as_slice(), &[0x80, 0x80, 0x80, 60, 0]);
        assert!(matches!(
            service.subscription(),
            Subscription::Subscribed { .. }
        ));
    }

    #[test]
    fn test_bind_host_handles_matching_layout() {
        let mut service = MidiService::new();

        assert_eq!(
            service.bind_host_handles(&MIDI_SERVICE_TABLE, 12, Some(13)),
            Ok(())
        );
        assert_eq!(service.value_handle(), Some(12));
        assert_eq!(service.cccd_handle(), Some(13));
    }

    #[test]
    fn test_bind_host_handles_rejects_missing_cccd() {
        let mut service = MidiService::new();

        assert_eq!(
            service.bind_host_handles(&MIDI_SERVICE_TABLE, 3, None),
            Err(BindError::Mismatch {
                val_handle: Some(3),
                cccd_handle: Some(4),
            })
        );
    }

    #[test]
    fn test_bind_host_handles_rejects_already_bound() {
        let mut service = registered_service();

        assert_eq!(
            service.bind_host_handles(&MIDI_SERVICE_TABLE, 10, Some(11)),
            Err(BindError::Mismatch {
                val_handle: Some(3),
                cccd_handle: Some(4),
            })
        );
    }

    #[test]
    fn test_bind_host_handles_value_too_low() {
        let mut service = MidiService::new();

        assert_eq!(
            service.bind_host_handles(&MIDI_SERVICE_TABLE, 1, Some(2)),
            Err(BindError::Register(RegisterError::InvalidFirstHandle))
        );
        assert_eq!(
            service.bind_host_handles(&MIDI_SERVICE_TABLE, 2, Some(3)),
            Err(BindError::Register(RegisterError::InvalidFirstHandle))
        );
        assert_eq!(service.value_handle(), None);
    }

    #[test]
    fn test_large_write_logged_in_full() {
        let mut service = registered_service();
        let mut data = [0u8; 200];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }

        crate::logger::capture::start();
        write(&mut service, &data).unwrap();

        let dump = format!("{}", HexBytes(&data));
        let lines = crate::logger::capture::lines();
        let line = lines
            .iter()
            .find(|line| line.contains("Received MIDI data"))
            .unwrap();
        assert!(line.contains("len=200"));
        assert!(line.ends_with(&dump));
        assert!(line.contains("00 01 02") && line.contains("C5 C6 C7"));
    }

    #[test]
    fn test_hex_dump_format() {
        let mut s: heapless::String<32> = heapless::String::new();
        core::fmt::Write::write_fmt(&mut s, format_args!("{}", HexBytes(&[0x80, 0x0A, 0xFF])))
            .unwrap();
        assert_eq!(s.as_str(), "80 0A FF");
    }
}
