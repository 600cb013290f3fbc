//! # BLE Session Module
//!
//! Wraps the host Bluetooth stack behind a small session abstraction so the
//! inspector never talks to `btleplug` directly.
//!
//! ```text
//! ble/
//! ├── btle_session.rs  - btleplug backed session (scan, connect, notifications)
//! └── known_uuids.rs   - UUID to human readable name tables
//! ```
//!
//! ## Event Flow
//!
//! ```text
//! btleplug ──► BtleSession ──[BleEvent]──► relay ──► InspectorWorker
//!                   ▲                                     │
//!                   └──────── read requests ──────────────┘
//! ```
//!
//! The session only produces events and answers reads. Everything that is
//! shown to the user is derived from the [`GattService`] snapshot returned by
//! [`BleSession::services`].

pub mod btle_session;
pub mod known_uuids;

use std::future::Future;
use uuid::Uuid;

/// Identity of the currently connected peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Advertised local name, if the peripheral sent one
    pub name: Option<String>,
    /// Platform address string (MAC on Linux/Windows, UUID on macOS)
    pub address: String,
    /// Advertised service UUIDs in advertisement order
    pub uuids: Vec<Uuid>,
}

impl DeviceInfo {
    /// Name shown in the header, falls back to the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    pub fn first_uuid(&self) -> Option<Uuid> {
        self.uuids.first().copied()
    }
}

/// A discovered GATT service.
///
/// `instance` disambiguates services that share a UUID on the same device;
/// it is the occurrence index of `uuid` in the session's service order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub instance: u16,
    pub characteristics: Vec<GattCharacteristic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub readable: bool,
    pub descriptors: Vec<Uuid>,
}

/// Events emitted by a BLE session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    Connecting,
    Connected,
    Disconnected,
    /// The GATT tree changed and should be rebuilt from [`BleSession::services`]
    ServicesDiscovered,
    /// A characteristic was read or notified
    CharacteristicValue {
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    DescriptorValue {
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
        descriptor: Uuid,
        value: Vec<u8>,
    },
}

/// Errors raised by the BLE session
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// Error reported by the platform Bluetooth stack
    #[error("Bluetooth error: {0}")]
    Adapter(#[from] btleplug::Error),

    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// No advertising peripheral matched the configured filter
    #[error("No device matching '{0}' found")]
    DeviceNotFound(String),

    #[error("Characteristic {characteristic} not found in service {service}#{instance}")]
    UnknownCharacteristic {
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
    },

    #[error("Descriptor {descriptor} not found on characteristic {characteristic}")]
    UnknownDescriptor {
        characteristic: Uuid,
        descriptor: Uuid,
    },

    #[error("Event channel closed: {0}")]
    ChannelClosed(String),

    /// Shutdown requested before the session was up
    #[error("BLE setup cancelled")]
    Cancelled,
}

/// Connected BLE peripheral as seen by the inspector.
///
/// Reads are answered directly. Notifications and lifecycle changes arrive
/// separately as [`BleEvent`]s on the channel the session was created with.
pub trait BleSession: Send + Sync {
    /// Device that is currently connected, `None` once the link dropped
    fn connected_device(&self) -> Option<DeviceInfo>;

    /// Snapshot of the discovered GATT tree in the session's service order
    fn services(&self) -> Vec<GattService>;

    fn read_characteristic(
        &self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<Vec<u8>, BleError>> + Send;

    fn read_descriptor(
        &self,
        service: Uuid,
        instance: u16,
        characteristic: Uuid,
        descriptor: Uuid,
    ) -> impl Future<Output = Result<Vec<u8>, BleError>> + Send;
}
