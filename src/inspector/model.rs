//! Inspector list model
//!
//! Three levels (services, characteristics, descriptors) rebuilt in full on
//! every discovery, plus the latest value read for each element. The model
//! doubles as the snapshot the UI renders, see
//! [`InspectorWorker`](super::inspector_handle::InspectorWorker).

use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::element::{ElementKey, ElementPath};
use super::format::format_value;
use crate::ble::known_uuids::NameLookup;
use crate::ble::{DeviceInfo, GattService};

/// A read the worker has to issue after a discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRequest {
    Characteristic(ElementKey),
    Descriptor(ElementKey),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectorModel {
    device: Option<DeviceInfo>,
    services: Vec<ElementPath>,
    characteristics: HashMap<ElementKey, Vec<ElementPath>>,
    descriptors: HashMap<ElementKey, Vec<ElementPath>>,
    values: HashMap<ElementKey, Vec<u8>>,
    /// Bumped on every rebuild or clear
    generation: u64,
    /// Bumped on every change
    revision: u64,
}

impl InspectorModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn set_device(&mut self, device: Option<DeviceInfo>) {
        self.device = device;
        self.revision += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drops the whole tree and all values
    pub fn clear(&mut self) {
        self.services.clear();
        self.characteristics.clear();
        self.descriptors.clear();
        self.values.clear();
        self.generation += 1;
        self.revision += 1;
    }

    /// Rebuilds the tree from `services` and returns the reads to issue:
    /// every readable characteristic and every descriptor, in tree order.
    pub fn on_services_discovered(
        &mut self,
        services: &[GattService],
        names: &impl NameLookup,
    ) -> Vec<ReadRequest> {
        self.clear();
        let mut reads = Vec::new();

        for service in services {
            let service_key = ElementKey::service(service.uuid, service.instance);
            self.services.push(ElementPath::new(
                service_key,
                service.uuid,
                names.service_name(&service.uuid),
            ));

            let mut characteristics = Vec::with_capacity(service.characteristics.len());
            for characteristic in &service.characteristics {
                let key =
                    ElementKey::characteristic(service.uuid, service.instance, characteristic.uuid);
                characteristics.push(ElementPath::new(
                    key,
                    characteristic.uuid,
                    names.characteristic_name(&characteristic.uuid),
                ));
                if characteristic.readable {
                    reads.push(ReadRequest::Characteristic(key));
                }

                let descriptors = characteristic
                    .descriptors
                    .iter()
                    .map(|descriptor| {
                        let key = ElementKey::descriptor(
                            service.uuid,
                            service.instance,
                            characteristic.uuid,
                            *descriptor,
                        );
                        reads.push(ReadRequest::Descriptor(key));
                        ElementPath::new(key, *descriptor, names.descriptor_name(descriptor))
                    })
                    .collect();
                self.descriptors.insert(key, descriptors);
            }
            self.characteristics.insert(service_key, characteristics);
        }

        debug!(
            "Rebuilt inspector tree: {} services, {} reads",
            self.services.len(),
            reads.len()
        );
        reads
    }

    /// Stores the latest value of a characteristic, replacing the previous one
    pub fn on_characteristic_value(
        &mut self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
        value: Vec<u8>,
    ) {
        let key = ElementKey::characteristic(service, instance, characteristic);
        self.values.insert(key, value);
        self.revision += 1;
    }

    pub fn on_descriptor_value(
        &mut self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
        descriptor: Uuid,
        value: Vec<u8>,
    ) {
        let key = ElementKey::descriptor(service, instance, characteristic, descriptor);
        self.values.insert(key, value);
        self.revision += 1;
    }

    pub fn value(&self, key: &ElementKey) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Formatted value of a row, `None` when nothing was read yet
    pub fn value_text(&self, path: &ElementPath) -> Option<String> {
        self.value(&path.key)
            .map(|value| format_value(value, path.data_format))
    }

    pub fn group_count(&self) -> usize {
        self.services.len()
    }

    pub fn group(&self, group: usize) -> Option<&ElementPath> {
        self.services.get(group)
    }

    pub fn children(&self, group: usize) -> &[ElementPath] {
        self.group(group)
            .and_then(|service| self.characteristics.get(&service.key))
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn children_count(&self, group: usize) -> usize {
        self.children(group).len()
    }

    pub fn child(&self, group: usize, child: usize) -> Option<&ElementPath> {
        self.children(group).get(child)
    }

    pub fn descriptors(&self, group: usize, child: usize) -> &[ElementPath] {
        self.child(group, child)
            .and_then(|characteristic| self.descriptors.get(&characteristic.key))
            .map_or(&[][..], Vec::as_slice)
    }

    fn element_mut(&mut self, key: &ElementKey) -> Option<&mut ElementPath> {
        let list = match (key.characteristic, key.descriptor) {
            (None, _) => Some(&mut self.services),
            (Some(_), None) => self
                .characteristics
                .get_mut(&ElementKey::service(key.service, key.instance)),
            (Some(_), Some(_)) => key.parent().and_then(|p| self.descriptors.get_mut(&p)),
        }?;
        list.iter_mut().find(|path| path.key == *key)
    }

    /// Switches an element between text and hex. Returns false for unknown keys.
    pub fn toggle_format(&mut self, key: &ElementKey) -> bool {
        let Some(path) = self.element_mut(key) else {
            return false;
        };
        path.data_format = path.data_format.toggled();
        self.revision += 1;
        true
    }

    /// Switches an element between showing its name and its UUID
    pub fn toggle_name(&mut self, key: &ElementKey) -> bool {
        let Some(path) = self.element_mut(key) else {
            return false;
        };
        path.showing_name = !path.showing_name;
        self.revision += 1;
        true
    }
}
