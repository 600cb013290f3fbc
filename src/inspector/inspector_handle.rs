//! Inspector worker and its UI facing handle
//!
//! The [`InspectorModel`] is owned by a single task. BLE events, read
//! results and UI commands are applied there one at a time and every change
//! is published as a fresh snapshot on a `watch` channel, so the UI never
//! reads a map that is being written.
//!
//! ```text
//! BleEvent ─────────┐
//! read results ─────┼──► InspectorWorker ──[InspectorModel]──► watch ──► UI
//! InspectorCommand ─┘          │
//!                              └── spawn reads ──► BleSession
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::element::ElementKey;
use super::model::{InspectorModel, ReadRequest};
use crate::ble::known_uuids::{KnownUuids, NameLookup};
use crate::ble::{BleEvent, BleSession};

const COMMAND_CAPACITY: usize = 32;
const READ_RESULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorCommand {
    ToggleFormat(ElementKey),
    ToggleName(ElementKey),
}

/// UI side of the inspector: snapshots in, commands out
#[derive(Clone)]
pub struct InspectorHandle {
    view: watch::Receiver<InspectorModel>,
    commands: mpsc::Sender<InspectorCommand>,
}

/// Worker side of the channels created by [`InspectorHandle::channels`]
pub struct InspectorEndpoint {
    view: watch::Sender<InspectorModel>,
    commands: mpsc::Receiver<InspectorCommand>,
}

impl InspectorHandle {
    /// Creates the channels before any session exists, so the UI can start
    /// rendering an empty inspector right away.
    pub fn channels() -> (InspectorHandle, InspectorEndpoint) {
        let (view_tx, view_rx) = watch::channel(InspectorModel::new());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        (
            InspectorHandle {
                view: view_rx,
                commands: command_tx,
            },
            InspectorEndpoint {
                view: view_tx,
                commands: command_rx,
            },
        )
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> InspectorModel {
        self.view.borrow().clone()
    }

    /// True once, after each change published since the last call
    pub fn has_changed(&mut self) -> bool {
        let changed = self.view.has_changed().unwrap_or(false);
        if changed {
            self.view.mark_unchanged();
        }
        changed
    }

    pub fn view_receiver(&self) -> watch::Receiver<InspectorModel> {
        self.view.clone()
    }

    pub fn send(&self, command: InspectorCommand) {
        if let Err(e) = self.commands.try_send(command) {
            warn!("Dropping inspector command: {}", e);
        }
    }
}

impl InspectorEndpoint {
    /// Replaces the snapshot seen by every [`InspectorHandle`]
    pub fn publish(&self, model: InspectorModel) {
        self.view.send_replace(model);
    }
}

/// Result of a read spawned for a given tree generation
struct ReadResult {
    generation: u64,
    event: BleEvent,
}

pub struct InspectorWorker<S: BleSession, N: NameLookup = KnownUuids> {
    session: Arc<S>,
    names: N,
    model: InspectorModel,
    events: mpsc::Receiver<BleEvent>,
    endpoint: InspectorEndpoint,
    reads_tx: mpsc::Sender<ReadResult>,
    reads_rx: mpsc::Receiver<ReadResult>,
}

impl<S> InspectorWorker<S, KnownUuids>
where
    S: BleSession + 'static,
{
    pub fn new(session: Arc<S>, events: mpsc::Receiver<BleEvent>, endpoint: InspectorEndpoint) -> Self {
        Self::with_names(session, events, endpoint, KnownUuids)
    }
}

impl<S, N> InspectorWorker<S, N>
where
    S: BleSession + 'static,
    N: NameLookup,
{
    pub fn with_names(
        session: Arc<S>,
        events: mpsc::Receiver<BleEvent>,
        endpoint: InspectorEndpoint,
        names: N,
    ) -> Self {
        let (reads_tx, reads_rx) = mpsc::channel(READ_RESULT_CAPACITY);
        Self {
            session,
            names,
            model: InspectorModel::new(),
            events,
            endpoint,
            reads_tx,
            reads_rx,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Inspector worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("BLE event channel closed");
                        break;
                    };
                    self.handle_event(event);
                }
                Some(result) = self.reads_rx.recv() => {
                    if result.generation == self.model.generation() {
                        self.handle_event(result.event);
                    } else {
                        debug!("Dropping read result of a previous discovery");
                    }
                }
                Some(command) = self.endpoint.commands.recv() => self.handle_command(command),
            }
        }
        info!("Inspector worker stopped");
    }

    fn publish(&self) {
        self.endpoint.publish(self.model.clone());
    }

    fn handle_command(&mut self, command: InspectorCommand) {
        let applied = match command {
            InspectorCommand::ToggleFormat(key) => self.model.toggle_format(&key),
            InspectorCommand::ToggleName(key) => self.model.toggle_name(&key),
        };
        if applied {
            self.publish();
        } else {
            debug!("Command for unknown element ignored: {:?}", command);
        }
    }

    fn handle_event(&mut self, event: BleEvent) {
        match event {
            BleEvent::Connecting => debug!("BLE connecting"),
            BleEvent::Connected => debug!("BLE connected"),
            BleEvent::Disconnected => {
                info!("Device disconnected, clearing inspector");
                self.model.clear();
                self.model.set_device(None);
            }
            BleEvent::ServicesDiscovered => self.on_services_discovered(),
            BleEvent::CharacteristicValue {
                service,
                instance,
                characteristic,
                value,
            } => {
                self.model
                    .on_characteristic_value(service, instance, characteristic, value);
            }
            BleEvent::DescriptorValue {
                service,
                instance,
                characteristic,
                descriptor,
                value,
            } => {
                self.model
                    .on_descriptor_value(service, instance, characteristic, descriptor, value);
            }
        }
        self.publish();
    }

    fn on_services_discovered(&mut self) {
        let Some(device) = self.session.connected_device() else {
            warn!("Services discovered without a connected device");
            self.model.clear();
            self.model.set_device(None);
            return;
        };
        self.model.set_device(Some(device));
        let reads = self
            .model
            .on_services_discovered(&self.session.services(), &self.names);
        self.spawn_reads(reads);
    }

    /// Issues the reads in the background, results come back through
    /// `reads_rx`. Failed reads are logged and never retried.
    fn spawn_reads(&self, reads: Vec<ReadRequest>) {
        if reads.is_empty() {
            return;
        }
        let session = self.session.clone();
        let results = self.reads_tx.clone();
        let generation = self.model.generation();

        tokio::spawn(async move {
            for read in reads {
                let event = match read_one(session.as_ref(), read).await {
                    Some(event) => event,
                    None => continue,
                };
                if results.send(ReadResult { generation, event }).await.is_err() {
                    break;
                }
            }
        });
    }
}

async fn read_one<S: BleSession>(session: &S, read: ReadRequest) -> Option<BleEvent> {
    match read {
        ReadRequest::Characteristic(key) => {
            let characteristic = key.characteristic?;
            match session
                .read_characteristic(key.service, key.instance, characteristic)
                .await
            {
                Ok(value) => Some(BleEvent::CharacteristicValue {
                    service: key.service,
                    instance: key.instance,
                    characteristic,
                    value,
                }),
                Err(e) => {
                    warn!("Read of {} failed: {}", key, e);
                    None
                }
            }
        }
        ReadRequest::Descriptor(key) => {
            let characteristic = key.characteristic?;
            let descriptor = key.descriptor?;
            match session
                .read_descriptor(key.service, key.instance, characteristic, descriptor)
                .await
            {
                Ok(value) => Some(BleEvent::DescriptorValue {
                    service: key.service,
                    instance: key.instance,
                    characteristic,
                    descriptor,
                    value,
                }),
                Err(e) => {
                    warn!("Read of {} failed: {}", key, e);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::known_uuids::from_short;
    use crate::ble::{BleError, DeviceInfo, GattService};
    use crate::inspector::model::tests::battery_and_info;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    struct FakeSession {
        device: Mutex<Option<DeviceInfo>>,
        services: Vec<GattService>,
    }

    impl BleSession for FakeSession {
        fn connected_device(&self) -> Option<DeviceInfo> {
            self.device.lock().unwrap().clone()
        }

        fn services(&self) -> Vec<GattService> {
            self.services.clone()
        }

        async fn read_characteristic(
            &self,
            service: Uuid,
            instance: u16,
            characteristic: Uuid,
        ) -> Result<Vec<u8>, BleError> {
            if characteristic == from_short(0x2A19) {
                Ok(vec![0x5A])
            } else {
                Err(BleError::UnknownCharacteristic {
                    service,
                    instance,
                    characteristic,
                })
            }
        }

        async fn read_descriptor(
            &self,
            _service: Uuid,
            _instance: u16,
            _characteristic: Uuid,
            _descriptor: Uuid,
        ) -> Result<Vec<u8>, BleError> {
            Ok(vec![0x01, 0x00])
        }
    }

    fn fake_session() -> Arc<FakeSession> {
        Arc::new(FakeSession {
            device: Mutex::new(Some(DeviceInfo {
                name: Some("Bluefruit52".to_string()),
                address: "F0:0D:00:00:00:01".to_string(),
                uuids: vec![from_short(0x180F)],
            })),
            services: battery_and_info(),
        })
    }

    async fn wait_until(
        view: &mut watch::Receiver<InspectorModel>,
        done: impl FnMut(&InspectorModel) -> bool,
    ) -> InspectorModel {
        tokio::time::timeout(Duration::from_secs(1), view.wait_for(done))
            .await
            .expect("inspector did not reach the expected state")
            .expect("inspector stopped")
            .clone()
    }

    #[tokio::test]
    async fn discovery_reads_and_publishes_values() {
        let (handle, endpoint) = InspectorHandle::channels();
        let (ble_tx, ble_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let worker = InspectorWorker::new(fake_session(), ble_rx, endpoint);
        let task = tokio::spawn(worker.run(cancel.clone()));

        ble_tx.send(BleEvent::ServicesDiscovered).await.unwrap();

        let battery = ElementKey::characteristic(from_short(0x180F), 0, from_short(0x2A19));
        let cccd = ElementKey::descriptor(
            from_short(0x180F),
            0,
            from_short(0x2A19),
            from_short(0x2902),
        );
        let mut view = handle.view_receiver();
        let model = wait_until(&mut view, |m| m.value(&battery).is_some() && m.value(&cccd).is_some()).await;

        assert_eq!(model.device().unwrap().display_name(), "Bluefruit52");
        assert_eq!(model.group_count(), 2);
        assert_eq!(model.value(&battery), Some(&[0x5A][..]));
        assert_eq!(model.value(&cccd), Some(&[0x01, 0x00][..]));
        // Manufacturer name read failed and stays absent
        let manufacturer = ElementKey::characteristic(from_short(0x180A), 0, from_short(0x2A29));
        assert_eq!(model.value(&manufacturer), None);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn notifications_overwrite_and_commands_toggle() {
        let (handle, endpoint) = InspectorHandle::channels();
        let (ble_tx, ble_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(InspectorWorker::new(fake_session(), ble_rx, endpoint).run(cancel.clone()));
        let mut view = handle.view_receiver();

        ble_tx.send(BleEvent::ServicesDiscovered).await.unwrap();
        let battery = ElementKey::characteristic(from_short(0x180F), 0, from_short(0x2A19));
        wait_until(&mut view, |m| m.value(&battery).is_some()).await;

        ble_tx
            .send(BleEvent::CharacteristicValue {
                service: from_short(0x180F),
                instance: 0,
                characteristic: from_short(0x2A19),
                value: vec![0x01, 0xAB, 0x3F],
            })
            .await
            .unwrap();
        let model = wait_until(&mut view, |m| m.value(&battery) == Some(&[0x01, 0xAB, 0x3F][..])).await;
        assert_eq!(
            model.value_text(model.child(0, 0).unwrap()).as_deref(),
            Some("01-AB-3F")
        );

        handle.send(InspectorCommand::ToggleFormat(battery));
        let model = wait_until(&mut view, |m| {
            m.child(0, 0).is_some_and(|c| c.data_format == crate::inspector::element::DataFormat::Text)
        })
        .await;
        assert_eq!(model.child(0, 0).unwrap().key, battery);

        ble_tx.send(BleEvent::Disconnected).await.unwrap();
        let model = wait_until(&mut view, |m| m.group_count() == 0).await;
        assert!(model.device().is_none());

        cancel.cancel();
        task.await.unwrap();
    }
}
