//! Host-agnostic GATT layer for the BLE-MIDI service
//!
//! The BLE host registers [`MIDI_SERVICE_TABLE`], then forwards reads,
//! writes, subscription changes and disconnects to a [`MidiService`]
//! through [`GattCallbacks`]. Outgoing notes leave through a
//! [`NotificationSink`].

pub mod service;
pub mod table;
pub mod traits;
pub mod types;
pub mod value;

pub use service::{BindError, MidiService, Subscription};
pub use table::{RegisterError, ServiceTable, MIDI_SERVICE_TABLE};
pub use traits::{GattCallbacks, NotificationSink};
pub use types::{
    AccessError, AccessOp, AttUuid, AttrHandle, ConnHandle, NotifyError, RegisterEvent,
    SubscribeEvent,
};
pub use value::CharacteristicValue;
