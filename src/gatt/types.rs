//! Event and error types exchanged between the BLE host and the MIDI service

use core::fmt;

use uuid::Uuid;

/// Connection handle assigned by the link layer
pub type ConnHandle = u16;

/// Attribute handle assigned by the GATT host
pub type AttrHandle = u16;

/// Characteristic property flags
pub mod chr_flags {
    pub const READ: u16 = 0x0002;
    pub const WRITE_NO_RSP: u16 = 0x0004;
    pub const WRITE: u16 = 0x0008;
    pub const NOTIFY: u16 = 0x0010;
    pub const INDICATE: u16 = 0x0020;
}

/// Descriptor access flags
pub mod att_flags {
    pub const READ: u8 = 0x01;
    pub const WRITE: u8 = 0x02;
}

/// Attribute type, either a SIG-assigned 16-bit UUID or a full 128-bit one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttUuid {
    Uuid16(u16),
    Uuid128(Uuid),
}

impl fmt::Display for AttUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid16(value) => write!(f, "0x{:04x}", value),
            Self::Uuid128(uuid) => write!(f, "{}", uuid),
        }
    }
}

/// Operation requested by the host on the characteristic access path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp<'a> {
    /// Read of the characteristic value
    ReadCharacteristic,
    /// Write of the characteristic value with the received bytes
    WriteCharacteristic(&'a [u8]),
    /// Read of a descriptor routed to the characteristic callback
    ReadDescriptor,
    /// Write of a descriptor routed to the characteristic callback
    WriteDescriptor(&'a [u8]),
}

/// Errors returned to the host from the access path
///
/// Each variant maps to an ATT error code sent back to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// Write longer than the characteristic value (0x0D)
    InvalidAttributeValueLength,
    /// Unsupported operation or a transfer that could not be copied (0x0E)
    Unlikely,
    /// Response buffer could not hold the value (0x11)
    InsufficientResources,
}

impl AccessError {
    /// ATT protocol error code
    pub fn att_code(&self) -> u8 {
        match self {
            Self::InvalidAttributeValueLength => 0x0D,
            Self::Unlikely => 0x0E,
            Self::InsufficientResources => 0x11,
        }
    }
}

/// Attribute registered by the host while adding the service table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterEvent {
    /// Primary service declaration
    Service { uuid: AttUuid, handle: AttrHandle },
    /// Characteristic declaration and its value attribute
    Characteristic {
        uuid: AttUuid,
        def_handle: AttrHandle,
        val_handle: AttrHandle,
    },
    /// Characteristic descriptor
    Descriptor {
        uuid: AttUuid,
        handle: AttrHandle,
        att_flags: u8,
    },
}

/// Subscription change reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeEvent {
    /// Peer connection, `None` when the host itself changed the state
    pub conn_handle: Option<ConnHandle>,
    /// Attribute the subscription refers to
    pub attr_handle: AttrHandle,
    pub prev_notify: bool,
    pub cur_notify: bool,
    pub prev_indicate: bool,
    pub cur_indicate: bool,
}

impl SubscribeEvent {
    /// Build an event from a raw CCCD value written by a peer.
    ///
    /// Bit 0 enables notifications, bit 1 enables indications.
    pub fn from_cccd_write(
        conn_handle: ConnHandle,
        attr_handle: AttrHandle,
        previous: u16,
        value: &[u8],
    ) -> Self {
        let current = match value {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            [lo] => *lo as u16,
            [] => 0,
        };
        Self {
            conn_handle: Some(conn_handle),
            attr_handle,
            prev_notify: previous & 0x0001 != 0,
            cur_notify: current & 0x0001 != 0,
            prev_indicate: previous & 0x0002 != 0,
            cur_indicate: current & 0x0002 != 0,
        }
    }

    /// CCCD value equivalent to the current state
    pub fn cccd_value(&self) -> u16 {
        (self.cur_notify as u16) | ((self.cur_indicate as u16) << 1)
    }
}

/// Errors reported by the host when sending a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// Connection no longer exists
    NotConnected,
    /// Host could not allocate a buffer for the payload
    OutOfBuffers,
    /// Controller or host failure
    HostError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_error_codes() {
        assert_eq!(AccessError::InvalidAttributeValueLength.att_code(), 0x0D);
        assert_eq!(AccessError::Unlikely.att_code(), 0x0E);
        assert_eq!(AccessError::InsufficientResources.att_code(), 0x11);
    }

    #[test]
    fn test_uuid_display() {
        assert_eq!(AttUuid::Uuid16(0x2902).to_string(), "0x2902");
        assert_eq!(
            AttUuid::Uuid128(crate::config::ble::MIDI_SERVICE_UUID).to_string(),
            "03b80e5a-ede8-4b33-a751-6ce34ec4c700"
        );
    }

    #[test]
    fn test_subscribe_from_cccd_write() {
        let event = SubscribeEvent::from_cccd_write(7, 4, 0x0000, &[0x01, 0x00]);
        assert_eq!(event.conn_handle, Some(7));
        assert_eq!(event.attr_handle, 4);
        assert!(!event.prev_notify);
        assert!(event.cur_notify);
        assert!(!event.cur_indicate);
        assert_eq!(event.cccd_value(), 0x0001);

        let event = SubscribeEvent::from_cccd_write(7, 4, 0x0001, &[0x02, 0x00]);
        assert!(event.prev_notify);
        assert!(!event.cur_notify);
        assert!(event.cur_indicate);

        let event = SubscribeEvent::from_cccd_write(7, 4, 0x0003, &[]);
        assert!(!event.cur_notify);
        assert!(!event.cur_indicate);
        assert_eq!(event.cccd_value(), 0);
    }
}
