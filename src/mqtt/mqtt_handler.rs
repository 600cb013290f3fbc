//! Bridge task owning the [`MqttManager`]
//!
//! The manager is not shared. One tokio task owns it and is the only place
//! its state changes; commands from the UI and the notification relay as
//! well as library events reach it over channels.
//!
//! ```text
//! UI / relay ──[BridgeCommand]──┐
//!                               ▼
//!                        run_bridge (MqttManager) ──[ConnectionStatus]──► watch
//!                               ▲         │
//! rumqttc poll task ──[TransportEvent]    └──[BridgeUpdate]──► UI
//! ```

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{MqttSettings, Qos};
use super::manager::{MqttListener, MqttManager, UserNotice};
use super::message_manager::MqttMessage;
use super::state::ConnectionStatus;
use super::transport::{MqttTransport, RumqttTransport, TransportEvent};

const COMMAND_CAPACITY: usize = 100;
const EVENT_CAPACITY: usize = 100;
const UPDATE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Connect { host: String, port: u16 },
    ConnectFromSettings,
    Disconnect,
    Subscribe { topic: String, qos: Qos },
    Unsubscribe { topic: String },
    Publish { topic: String, payload: Vec<u8>, qos: Qos },
}

/// Listener output as delivered to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeUpdate {
    Connected,
    Disconnected,
    Message(MqttMessage),
    Notice(UserNotice),
}

/// [`MqttListener`] that forwards every callback into a channel.
///
/// The channel is bounded and never awaited; updates that do not fit while
/// the UI is not draining are dropped.
pub struct ChannelListener {
    updates: mpsc::Sender<BridgeUpdate>,
}

impl ChannelListener {
    pub fn new(updates: mpsc::Sender<BridgeUpdate>) -> Self {
        Self { updates }
    }

    fn forward(&self, update: BridgeUpdate) {
        match self.updates.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(update)) => {
                warn!("UI not keeping up, dropping {:?}", update);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => debug!("No receiver for bridge updates"),
        }
    }
}

impl MqttListener for ChannelListener {
    fn on_connected(&mut self) {
        self.forward(BridgeUpdate::Connected);
    }

    fn on_disconnected(&mut self) {
        self.forward(BridgeUpdate::Disconnected);
    }

    fn on_message_arrived(&mut self, message: MqttMessage) {
        self.forward(BridgeUpdate::Message(message));
    }

    fn on_user_notice(&mut self, notice: UserNotice) {
        self.forward(BridgeUpdate::Notice(notice));
    }
}

/// Handle to the running bridge task
#[derive(Clone)]
pub struct MQTTHandle {
    commands: mpsc::Sender<BridgeCommand>,
    status: watch::Receiver<ConnectionStatus>,
}

impl MQTTHandle {
    /// Spawns the bridge over `rumqttc`.
    ///
    /// Returns the handle, the receiver for listener updates and the task.
    pub fn spawn(
        settings: MqttSettings,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<BridgeUpdate>, JoinHandle<()>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (update_tx, update_rx) = mpsc::channel(UPDATE_CAPACITY);

        let mut manager = MqttManager::new(RumqttTransport::new(event_tx), settings);
        manager.set_listener(ChannelListener::new(update_tx));

        let (handle, task) = Self::spawn_with(manager, event_rx, cancel);
        (handle, update_rx, task)
    }

    /// Spawns the bridge around an existing manager and its transport events.
    pub fn spawn_with<T, L>(
        manager: MqttManager<T, L>,
        events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>)
    where
        T: MqttTransport + 'static,
        L: MqttListener + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(manager.status());

        let task = tokio::spawn(run_bridge(manager, command_rx, events, status_tx, cancel));

        (
            Self {
                commands: command_tx,
                status: status_rx,
            },
            task,
        )
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn sender(&self) -> mpsc::Sender<BridgeCommand> {
        self.commands.clone()
    }

    /// Queues a command without waiting, usable from the UI thread
    pub fn send(&self, command: BridgeCommand) {
        if let Err(e) = self.commands.try_send(command) {
            warn!("Dropping bridge command: {}", e);
        }
    }
}

pub async fn run_bridge<T: MqttTransport, L: MqttListener>(
    mut manager: MqttManager<T, L>,
    mut commands: mpsc::Receiver<BridgeCommand>,
    mut events: mpsc::Receiver<TransportEvent>,
    status: watch::Sender<ConnectionStatus>,
    cancel: CancellationToken,
) {
    info!("MQTT bridge started");
    if manager.settings().connect_on_start {
        manager.connect_from_settings();
        status.send_replace(manager.status());
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                manager.disconnect();
                break;
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All bridge command senders dropped");
                    break;
                };
                apply_command(&mut manager, command);
            }
            Some(event) = events.recv() => manager.handle_transport_event(event),
        }
        status.send_replace(manager.status());
    }

    status.send_replace(manager.status());
    info!("MQTT bridge stopped");
}

fn apply_command<T: MqttTransport, L: MqttListener>(
    manager: &mut MqttManager<T, L>,
    command: BridgeCommand,
) {
    match command {
        BridgeCommand::Connect { host, port } => manager.connect(&host, port),
        BridgeCommand::ConnectFromSettings => manager.connect_from_settings(),
        BridgeCommand::Disconnect => manager.disconnect(),
        BridgeCommand::Subscribe { topic, qos } => manager.subscribe(&topic, qos),
        BridgeCommand::Unsubscribe { topic } => manager.unsubscribe(&topic),
        BridgeCommand::Publish {
            topic,
            payload,
            qos,
        } => manager.publish(&topic, &payload, qos),
    }
}
