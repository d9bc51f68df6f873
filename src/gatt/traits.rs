//! Seams between the MIDI service and the BLE host
//!
//! The host calls into the service through [`GattCallbacks`] and the
//! service calls back out through [`NotificationSink`]. Keeping both as
//! traits lets the service run against `trouble-host` on the device and
//! against a mock in unit tests.

use core::future::Future;

use heapless::Vec;

use crate::gatt::types::{
    AccessError, AccessOp, AttrHandle, ConnHandle, NotifyError, RegisterEvent, SubscribeEvent,
};

/// Events the host dispatches into a GATT service
pub trait GattCallbacks {
    /// Read or write of the characteristic.
    ///
    /// Read responses are appended to `out`.
    fn access<const M: usize>(
        &mut self,
        conn_handle: ConnHandle,
        attr_handle: AttrHandle,
        op: AccessOp<'_>,
        out: &mut Vec<u8, M>,
    ) -> Result<(), AccessError>;

    /// An attribute of the table was registered.
    fn on_register(&mut self, event: &RegisterEvent);

    /// A peer changed its notification or indication subscription.
    fn on_subscribe(&mut self, event: &SubscribeEvent);

    /// A connection was closed.
    fn on_disconnect(&mut self, conn_handle: ConnHandle);
}

/// Outbound notification primitive of the host
pub trait NotificationSink {
    /// Send `payload` as a notification of `attr_handle` to `conn_handle`.
    fn notify(
        &mut self,
        conn_handle: ConnHandle,
        attr_handle: AttrHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), NotifyError>>;
}
