//! Fans BLE events out to the inspector and, when enabled, publishes
//! characteristic values to the broker.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ble::BleEvent;
use crate::mqtt::config::{MqttSettings, Qos};
use crate::mqtt::mqtt_handler::BridgeCommand;

const CHARACTERISTIC_PLACEHOLDER: &str = "{characteristic}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRelay {
    topic: Option<String>,
    qos: Qos,
}

impl NotificationRelay {
    pub fn from_settings(settings: &MqttSettings) -> Self {
        let topic = settings
            .publish_topic
            .clone()
            .filter(|t| settings.publish_enabled && !t.is_empty());
        Self {
            topic,
            qos: settings.publish_qos,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.topic.is_some()
    }

    /// Publish command for a characteristic value, `None` for anything else.
    ///
    /// The payload is the raw value; the bridge drops it while disconnected.
    pub fn command_for(&self, event: &BleEvent) -> Option<BridgeCommand> {
        let topic = self.topic.as_ref()?;
        match event {
            BleEvent::CharacteristicValue {
                characteristic,
                value,
                ..
            } => Some(BridgeCommand::Publish {
                topic: topic.replace(CHARACTERISTIC_PLACEHOLDER, &characteristic.to_string()),
                payload: value.clone(),
                qos: self.qos,
            }),
            _ => None,
        }
    }
}

/// Forwards every event to the inspector until cancelled or the source closes.
pub async fn run_relay(
    relay: NotificationRelay,
    mut source: mpsc::Receiver<BleEvent>,
    inspector: mpsc::Sender<BleEvent>,
    bridge: mpsc::Sender<BridgeCommand>,
    cancel: CancellationToken,
) {
    info!("Notification relay started (publishing: {})", relay.is_enabled());
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = source.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if let Some(command) = relay.command_for(&event) {
            if bridge.send(command).await.is_err() {
                debug!("Bridge gone, no longer publishing");
            }
        }
        if inspector.send(event).await.is_err() {
            debug!("Inspector gone, stopping relay");
            break;
        }
    }
    info!("Notification relay stopped");
}
