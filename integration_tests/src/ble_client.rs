//! BLE client for talking to the BLE-MIDI device.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

/// BLE-MIDI service and characteristic UUIDs
pub const MIDI_SERVICE_UUID: Uuid = Uuid::from_u128(0x03b80e5a_ede8_4b33_a751_6ce34ec4c700);
pub const MIDI_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x7772e5db_3868_4112_a1a9_f2669d106bf3);

/// BLE client for the BLE-MIDI device.
pub struct BleClient {
    peripheral: Peripheral,
    midi_char: Characteristic,
    /// Notifications received so far, oldest first
    notifications: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BleClient {
    /// Scan for a device whose name starts with `prefix` and connect.
    pub async fn connect_by_name_prefix(prefix: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device(&adapter, prefix, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let midi_char = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == MIDI_SERVICE_UUID && c.uuid == MIDI_CHARACTERISTIC_UUID)
            .ok_or_else(|| anyhow!("MIDI characteristic not found"))?;

        let notifications = Arc::new(Mutex::new(Vec::new()));

        // Collect notifications in the background
        let buffer_clone = notifications.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == MIDI_CHARACTERISTIC_UUID {
                    buffer_clone.lock().await.push(data.value);
                }
            }
        });

        Ok(Self {
            peripheral,
            midi_char,
            notifications,
        })
    }

    /// Find a device by name prefix within the scan timeout.
    async fn find_device(adapter: &Adapter, prefix: &str, scan_timeout: Duration) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.is_some_and(|name| name.starts_with(prefix)) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("No device named '{}*' found within timeout", prefix))
    }

    /// Enable notifications on the MIDI characteristic.
    pub async fn subscribe(&self) -> Result<()> {
        self.peripheral.subscribe(&self.midi_char).await?;
        Ok(())
    }

    /// Disable notifications on the MIDI characteristic.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.midi_char).await?;
        Ok(())
    }

    /// Write bytes to the MIDI characteristic (write without response).
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.midi_char, data, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    /// Read the MIDI characteristic value.
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(&self.midi_char).await?)
    }

    /// Wait for the next notification.
    pub async fn wait_for_notification(&self, wait: Duration) -> Result<Vec<u8>> {
        let result = timeout(wait, async {
            loop {
                {
                    let mut buf = self.notifications.lock().await;
                    if !buf.is_empty() {
                        return buf.remove(0);
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        result.map_err(|_| anyhow!("Timeout waiting for MIDI notification"))
    }

    /// Drop any notifications received so far.
    pub async fn clear_notifications(&self) {
        self.notifications.lock().await.clear();
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
