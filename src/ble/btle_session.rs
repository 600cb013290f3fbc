//! btleplug backed [`BleSession`]
//!
//! Scans once, connects to the first peripheral matching the configured
//! filter, discovers its GATT tree and subscribes to every notifying
//! characteristic. Afterwards [`BtleSession::run`] pumps notifications and
//! adapter events into the [`BleEvent`] channel until the link drops or the
//! application shuts down.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, Service,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{BleError, BleEvent, BleSession, DeviceInfo, GattCharacteristic, GattService};
use crate::config::BleSettings;

pub struct BtleSession {
    adapter: Adapter,
    peripheral: Peripheral,
    device: DeviceInfo,
    connected: AtomicBool,
}

impl BtleSession {
    /// Scans, connects and discovers services.
    ///
    /// Emits `Connecting`, `Connected` and `ServicesDiscovered` on `events`
    /// as the session progresses. The returned session is connected; call
    /// [`BtleSession::run`] to keep forwarding notifications. Scan, connect
    /// and discovery give up with [`BleError::Cancelled`] once `cancel` fires.
    pub async fn connect(
        settings: &BleSettings,
        events: &mpsc::Sender<BleEvent>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Self>, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::NoAdapter)?;

        info!("Scanning for {}s", settings.scan_secs);
        adapter.start_scan(ScanFilter::default()).await?;
        let scanned =
            unless_cancelled(cancel, tokio::time::sleep(Duration::from_secs(settings.scan_secs)))
                .await;
        adapter.stop_scan().await?;
        scanned?;

        let (peripheral, device) = Self::pick_peripheral(&adapter, settings).await?;
        info!("Connecting to {} ({})", device.display_name(), device.address);

        send_event(events, BleEvent::Connecting).await?;
        unless_cancelled(cancel, peripheral.connect()).await??;
        send_event(events, BleEvent::Connected).await?;

        unless_cancelled(cancel, peripheral.discover_services()).await??;
        for characteristic in peripheral.characteristics() {
            if characteristic.properties.contains(CharPropFlags::NOTIFY)
                || characteristic.properties.contains(CharPropFlags::INDICATE)
            {
                debug!("Subscribing to {}", characteristic.uuid);
                if let Err(e) = peripheral.subscribe(&characteristic).await {
                    warn!("Subscribe to {} failed: {}", characteristic.uuid, e);
                }
            }
        }

        let session = Arc::new(Self {
            adapter,
            peripheral,
            device,
            connected: AtomicBool::new(true),
        });
        send_event(events, BleEvent::ServicesDiscovered).await?;
        Ok(session)
    }

    async fn pick_peripheral(
        adapter: &Adapter,
        settings: &BleSettings,
    ) -> Result<(Peripheral, DeviceInfo), BleError> {
        let filter = settings.device_filter.as_deref().map(str::to_lowercase);

        for peripheral in adapter.peripherals().await? {
            let Some(properties) = peripheral.properties().await? else {
                continue;
            };
            let device = DeviceInfo {
                name: properties.local_name.clone(),
                address: properties.address.to_string(),
                uuids: properties.services.clone(),
            };
            debug!("Found peripheral {} ({})", device.display_name(), device.address);

            if matches_filter(&device, filter.as_deref()) {
                return Ok((peripheral, device));
            }
        }

        Err(BleError::DeviceNotFound(
            settings
                .device_filter
                .clone()
                .unwrap_or_else(|| "<any named device>".to_string()),
        ))
    }

    /// Forwards notifications and link loss until cancelled.
    pub async fn run(
        self: Arc<Self>,
        events: mpsc::Sender<BleEvent>,
        cancel: CancellationToken,
    ) -> Result<(), BleError> {
        let mut notifications = self.peripheral.notifications().await?;
        let mut central_events = self.adapter.events().await?;
        let peripheral_id = self.peripheral.id();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Disconnecting from {}", self.device.display_name());
                    if let Err(e) = self.peripheral.disconnect().await {
                        warn!("Disconnect failed: {}", e);
                    }
                    break;
                }
                notification = notifications.next() => {
                    let Some(notification) = notification else {
                        warn!("Notification stream ended, treating as disconnect");
                        self.connected.store(false, Ordering::SeqCst);
                        send_event(&events, BleEvent::Disconnected).await?;
                        break;
                    };
                    match self.locate_characteristic(notification.uuid) {
                        Some((service, instance)) => {
                            send_event(&events, BleEvent::CharacteristicValue {
                                service,
                                instance,
                                characteristic: notification.uuid,
                                value: notification.value,
                            }).await?;
                        }
                        None => warn!("Notification from unknown characteristic {}", notification.uuid),
                    }
                }
                Some(event) = central_events.next() => {
                    if let CentralEvent::DeviceDisconnected(id) = event {
                        if id == peripheral_id {
                            info!("{} disconnected", self.device.display_name());
                            self.connected.store(false, Ordering::SeqCst);
                            send_event(&events, BleEvent::Disconnected).await?;
                            break;
                        }
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Services in btleplug's order (a sorted set), each with its instance
    fn indexed_services(&self) -> Vec<(u16, Service)> {
        let services: Vec<Service> = self.peripheral.services().into_iter().collect();
        let instances = assign_instances(services.iter().map(|s| s.uuid));
        instances.into_iter().zip(services).collect()
    }

    fn find_characteristic(
        &self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
    ) -> Result<Characteristic, BleError> {
        self.indexed_services()
            .into_iter()
            .find(|(i, s)| s.uuid == service && *i == instance)
            .and_then(|(_, s)| {
                s.characteristics
                    .into_iter()
                    .find(|c| c.uuid == characteristic)
            })
            .ok_or(BleError::UnknownCharacteristic {
                service,
                instance,
                characteristic,
            })
    }

    /// Notifications only carry the characteristic UUID, the first service
    /// that owns it wins.
    fn locate_characteristic(&self, characteristic: Uuid) -> Option<(Uuid, u16)> {
        self.indexed_services()
            .into_iter()
            .find(|(_, s)| s.characteristics.iter().any(|c| c.uuid == characteristic))
            .map(|(instance, s)| (s.uuid, instance))
    }
}

impl BleSession for BtleSession {
    fn connected_device(&self) -> Option<DeviceInfo> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.device.clone())
    }

    fn services(&self) -> Vec<GattService> {
        self.indexed_services()
            .into_iter()
            .map(|(instance, service)| GattService {
                uuid: service.uuid,
                instance,
                characteristics: service
                    .characteristics
                    .iter()
                    .map(|c| GattCharacteristic {
                        uuid: c.uuid,
                        readable: c.properties.contains(CharPropFlags::READ),
                        descriptors: c.descriptors.iter().map(|d| d.uuid).collect(),
                    })
                    .collect(),
            })
            .collect()
    }

    async fn read_characteristic(
        &self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, BleError> {
        let characteristic = self.find_characteristic(service, instance, characteristic)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    async fn read_descriptor(
        &self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
        descriptor: Uuid,
    ) -> Result<Vec<u8>, BleError> {
        let owner = self.find_characteristic(service, instance, characteristic)?;
        let descriptor = owner
            .descriptors
            .iter()
            .find(|d| d.uuid == descriptor)
            .cloned()
            .ok_or(BleError::UnknownDescriptor {
                characteristic,
                descriptor,
            })?;
        Ok(self.peripheral.read_descriptor(&descriptor).await?)
    }
}

/// Runs `step` to completion unless `cancel` fires first.
async fn unless_cancelled<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = T>,
) -> Result<T, BleError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("BLE setup cancelled");
            Err(BleError::Cancelled)
        }
        output = step => Ok(output),
    }
}

async fn send_event(events: &mpsc::Sender<BleEvent>, event: BleEvent) -> Result<(), BleError> {
    events.send(event).await.map_err(|e| {
        error!("BLE event receiver dropped");
        BleError::ChannelClosed(e.to_string())
    })
}

/// Numbers repeated UUIDs by occurrence: `[A, B, A]` -> `[0, 0, 1]`.
fn assign_instances(uuids: impl Iterator<Item = Uuid>) -> Vec<u16> {
    let mut seen: HashMap<Uuid, u16> = HashMap::new();
    uuids
        .map(|uuid| {
            let counter = seen.entry(uuid).or_insert(0);
            let instance = *counter;
            *counter += 1;
            instance
        })
        .collect()
}

/// Without a filter any peripheral advertising a name is accepted.
fn matches_filter(device: &DeviceInfo, filter: Option<&str>) -> bool {
    match filter {
        None => device.name.is_some(),
        Some(filter) => {
            device.address.to_lowercase() == filter
                || device
                    .name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(filter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::known_uuids::from_short;

    #[test]
    fn instances_count_repeated_services() {
        let a = from_short(0x180F);
        let b = from_short(0x180A);
        assert_eq!(assign_instances([a, b, a, a, b].into_iter()), vec![0, 0, 1, 2, 1]);
    }

    #[tokio::test]
    async fn cancelled_setup_step_returns_early() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = unless_cancelled(&cancel, std::future::pending::<()>()).await;
        assert!(matches!(result, Err(BleError::Cancelled)));
    }

    #[tokio::test]
    async fn setup_step_runs_while_not_cancelled() {
        let cancel = CancellationToken::new();
        let result = unless_cancelled(&cancel, async { 7 }).await;
        assert!(matches!(result, Ok(7)));
    }

    #[tokio::test]
    async fn cancelling_interrupts_a_long_scan() {
        let cancel = CancellationToken::new();
        let scan = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                unless_cancelled(&cancel, tokio::time::sleep(Duration::from_secs(3600))).await
            })
        };
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), scan)
            .await
            .expect("scan ignored cancellation")
            .unwrap();
        assert!(matches!(result, Err(BleError::Cancelled)));
    }

    #[test]
    fn filter_matches_name_or_address() {
        let device = DeviceInfo {
            name: Some("Adafruit Bluefruit LE".to_string()),
            address: "F0:0D:12:34:56:78".to_string(),
            uuids: vec![],
        };
        assert!(matches_filter(&device, Some("bluefruit")));
        assert!(matches_filter(&device, Some("f0:0d:12:34:56:78")));
        assert!(!matches_filter(&device, Some("thingy")));
        assert!(matches_filter(&device, None));

        let anonymous = DeviceInfo {
            name: None,
            ..device
        };
        assert!(!matches_filter(&anonymous, None));
    }
}
