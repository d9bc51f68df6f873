//! Static GATT service table and handle assignment
//!
//! The table describes the services the firmware exposes. Registering it
//! walks every attribute in declaration order, assigns consecutive handles
//! and reports each one through [`GattCallbacks::on_register`]:
//!
//! ```text
//! handle+0  service declaration
//! handle+1  characteristic declaration
//! handle+2  characteristic value
//! handle+3  CCCD (only for notify/indicate characteristics)
//! ```

use crate::config::ble::{CCCD_UUID16, MIDI_CHARACTERISTIC_UUID, MIDI_SERVICE_UUID};
use crate::gatt::traits::GattCallbacks;
use crate::gatt::types::{att_flags, chr_flags, AttUuid, AttrHandle, RegisterEvent};

/// Errors that can occur while registering a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Handle 0 is reserved
    InvalidFirstHandle,
    /// Table does not fit in the remaining handle space
    HandleSpaceExhausted,
}

/// Characteristic entry of a service table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicDef {
    pub uuid: AttUuid,
    /// Property flags from [`chr_flags`]
    pub flags: u16,
}

impl CharacteristicDef {
    /// Whether the host adds a CCCD for this characteristic
    pub const fn has_cccd(&self) -> bool {
        self.flags & (chr_flags::NOTIFY | chr_flags::INDICATE) != 0
    }

    const fn attribute_count(&self) -> usize {
        if self.has_cccd() {
            3
        } else {
            2
        }
    }
}

/// Primary service entry of a service table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDef {
    pub uuid: AttUuid,
    pub characteristics: &'static [CharacteristicDef],
}

/// Declarative list of services
#[derive(Debug, Clone, Copy)]
pub struct ServiceTable {
    services: &'static [ServiceDef],
}

/// The BLE-MIDI service: one characteristic, readable, writable without
/// response and notifiable.
pub const MIDI_SERVICE_TABLE: ServiceTable = ServiceTable::new(&[ServiceDef {
    uuid: AttUuid::Uuid128(MIDI_SERVICE_UUID),
    characteristics: &[CharacteristicDef {
        uuid: AttUuid::Uuid128(MIDI_CHARACTERISTIC_UUID),
        flags: chr_flags::READ | chr_flags::WRITE_NO_RSP | chr_flags::NOTIFY,
    }],
}]);

impl ServiceTable {
    pub const fn new(services: &'static [ServiceDef]) -> Self {
        Self { services }
    }

    /// Number of attribute handles the table occupies.
    pub fn attribute_count(&self) -> usize {
        self.services
            .iter()
            .map(|svc| {
                1 + svc
                    .characteristics
                    .iter()
                    .map(CharacteristicDef::attribute_count)
                    .sum::<usize>()
            })
            .sum()
    }

    /// Assign handles starting at `first_handle` and report every attribute.
    ///
    /// Nothing is reported if the table does not fit. Returns the first
    /// handle after the table.
    pub fn register<C: GattCallbacks>(
        &self,
        first_handle: AttrHandle,
        callbacks: &mut C,
    ) -> Result<AttrHandle, RegisterError> {
        if first_handle == 0 {
            return Err(RegisterError::InvalidFirstHandle);
        }

        let end = first_handle as usize + self.attribute_count();
        if end > u16::MAX as usize + 1 {
            return Err(RegisterError::HandleSpaceExhausted);
        }

        let mut next = first_handle;
        let mut take = || {
            let handle = next;
            next = next.wrapping_add(1);
            handle
        };

        for svc in self.services {
            callbacks.on_register(&RegisterEvent::Service {
                uuid: svc.uuid,
                handle: take(),
            });

            for chr in svc.characteristics {
                let def_handle = take();
                let val_handle = take();
                callbacks.on_register(&RegisterEvent::Characteristic {
                    uuid: chr.uuid,
                    def_handle,
                    val_handle,
                });

                if chr.has_cccd() {
                    callbacks.on_register(&RegisterEvent::Descriptor {
                        uuid: AttUuid::Uuid16(CCCD_UUID16),
                        handle: take(),
                        att_flags: att_flags::READ | att_flags::WRITE,
                    });
                }
            }
        }

        // `end` may be 0x10000 when the table ends on the last handle
        Ok(end as AttrHandle)
    }
}
