//! BLE central adapter on `btleplug` (feature `btleplug`).
//!
//! Must be driven from inside a tokio runtime on platforms whose
//! btleplug backend needs one (BlueZ).  Notifications are buffered by
//! btleplug's own stream; [`BleLink::next_notification`] polls it once
//! and never waits.

use core::pin::Pin;
use core::time::Duration;

use async_io_mini::Timer;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_lite::future::poll_once;
use futures_lite::{Stream, StreamExt};
use log::{info, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::link::transport::{
    BleLink, Capabilities, Channel, Connection, DiscoveredDevice, Notification, WriteMode,
    WriteTarget,
};

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

pub struct BtleplugLink {
    adapter: Adapter,
    peripheral: Option<Peripheral>,
    characteristics: Vec<Characteristic>,
    notifications: Option<NotificationStream>,
    next_handle: u32,
}

fn map_err(e: btleplug::Error, fallback: TransportError) -> TransportError {
    match e {
        btleplug::Error::PermissionDenied => TransportError::PermissionDenied,
        btleplug::Error::NotConnected => TransportError::LinkLost,
        other => {
            warn!("btleplug: {other}");
            fallback
        }
    }
}

impl BtleplugLink {
    /// Open the first Bluetooth adapter on the host.
    pub async fn first_adapter() -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| map_err(e, TransportError::ScanFailed))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| map_err(e, TransportError::ScanFailed))?
            .into_iter()
            .next()
            .ok_or(TransportError::ScanFailed)?;
        Ok(Self {
            adapter,
            peripheral: None,
            characteristics: Vec::new(),
            notifications: None,
            next_handle: 1,
        })
    }

    fn characteristic(&self, uuid: u128) -> Result<&Characteristic, TransportError> {
        let uuid = Uuid::from_u128(uuid);
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicMissing("unknown"))
    }

    fn peripheral(&self) -> Result<&Peripheral, TransportError> {
        self.peripheral.as_ref().ok_or(TransportError::NotConnected)
    }

    async fn find(&self, device_id: &str) -> Result<Peripheral, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| map_err(e, TransportError::ConnectFailed))?;
        peripherals
            .into_iter()
            .find(|p| format!("{:?}", p.id()) == device_id)
            .ok_or(TransportError::ConnectFailed)
    }
}

impl BleLink for BtleplugLink {
    async fn scan(
        &mut self,
        name_filter: &str,
        duration: Duration,
    ) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| map_err(e, TransportError::ScanFailed))?;
        Timer::after(duration).await;
        let _ = self.adapter.stop_scan().await;

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| map_err(e, TransportError::ScanFailed))?;

        let mut found = Vec::new();
        for p in peripherals {
            let Ok(Some(props)) = p.properties().await else {
                continue;
            };
            let Some(name) = props.local_name else {
                continue;
            };
            if name.contains(name_filter) {
                found.push(DiscoveredDevice {
                    id: format!("{:?}", p.id()),
                    name,
                    rssi: props.rssi,
                });
            }
        }
        Ok(found)
    }

    async fn connect(&mut self, device_id: &str) -> Result<Connection, TransportError> {
        let peripheral = self.find(device_id).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| map_err(e, TransportError::ConnectFailed))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| map_err(e, TransportError::ConnectFailed))?;

        self.characteristics = peripheral.characteristics().into_iter().collect();
        let mut capabilities = Capabilities::default();
        for c in &self.characteristics {
            capabilities.insert_uuid(c.uuid.as_u128());
        }

        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| map_err(e, TransportError::SubscribeFailed))?;

        info!("BLE connected to {device_id}");
        self.notifications = Some(notifications);
        self.peripheral = Some(peripheral);
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);

        Ok(Connection {
            device_id: device_id.to_owned(),
            handle,
            capabilities,
        })
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.notifications = None;
        self.characteristics.clear();
        if let Some(p) = self.peripheral.take() {
            p.disconnect()
                .await
                .map_err(|e| map_err(e, TransportError::LinkLost))?;
        }
        Ok(())
    }

    async fn subscribe(&mut self, channel: Channel) -> Result<(), TransportError> {
        let characteristic = self.characteristic(channel.uuid())?.clone();
        self.peripheral()?
            .subscribe(&characteristic)
            .await
            .map_err(|e| map_err(e, TransportError::SubscribeFailed))
    }

    async fn write(
        &mut self,
        target: WriteTarget,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(target.uuid())?.clone();
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral()?
            .write(&characteristic, data, write_type)
            .await
            .map_err(|e| map_err(e, TransportError::WriteFailed))
    }

    async fn next_notification(&mut self) -> Result<Option<Notification>, TransportError> {
        let stream = self.notifications.as_mut().ok_or(TransportError::NotConnected)?;
        loop {
            match poll_once(stream.next()).await {
                // Nothing buffered right now.
                None => return Ok(None),
                // Stream ended: the peripheral went away.
                Some(None) => return Err(TransportError::LinkLost),
                Some(Some(ValueNotification { uuid, value, .. })) => {
                    if let Some(channel) = Channel::from_uuid(uuid.as_u128()) {
                        return Ok(Some(Notification {
                            channel,
                            payload: value,
                        }));
                    }
                }
            }
        }
    }
}
