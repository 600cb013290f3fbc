//! Seam between the bridge and the MQTT client library
//!
//! [`MqttTransport`] is the only place the bridge touches `rumqttc`. Calls
//! are fire-and-forget; whatever the library reports later comes back as a
//! [`TransportEvent`] tagged with the generation of the client that produced
//! it, so events of a released client can be told apart from the live one.

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, NetworkOptions, Outgoing,
    Packet,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{ConnectOptions, Qos};
use super::error::MqttError;

const REQUEST_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    ConnectSucceeded,
    ConnectFailed(String),
    /// `None` when the connection closed without an error
    ConnectionLost(Option<String>),
    MessageArrived {
        topic: String,
        payload: Vec<u8>,
        qos: Qos,
        duplicate: bool,
    },
    DeliveryComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

pub trait MqttTransport: Send {
    /// Creates a client and starts connecting; the outcome arrives as an event
    fn connect(&mut self, options: &ConnectOptions, generation: u64) -> Result<(), MqttError>;
    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), MqttError>;
    fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError>;
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool)
        -> Result<(), MqttError>;
    /// Requests a disconnect and releases the client
    fn disconnect(&mut self) -> Result<(), MqttError>;
}

/// [`MqttTransport`] over `rumqttc`.
///
/// Each `connect` creates a fresh [`AsyncClient`] plus a task polling its
/// [`EventLoop`]. The poll task stops at the first error, the library is
/// never polled again after a failure so it does not reconnect by itself.
pub struct RumqttTransport {
    events: mpsc::Sender<TransportEvent>,
    client: Option<AsyncClient>,
    poller: Option<CancellationToken>,
}

impl RumqttTransport {
    pub fn new(events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            events,
            client: None,
            poller: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, MqttError> {
        self.client.as_ref().ok_or(MqttError::NoClient)
    }

    fn release(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }
        self.client = None;
    }
}

impl MqttTransport for RumqttTransport {
    fn connect(&mut self, options: &ConnectOptions, generation: u64) -> Result<(), MqttError> {
        self.release();

        debug!("Creating MQTT client for {}", options.uri());
        let mut mqtt_options = MqttOptions::new(&options.client_id, &options.host, options.port);
        mqtt_options
            .set_clean_session(options.clean_session)
            .set_keep_alive(options.keep_alive);
        if let Some((user, password)) = &options.credentials {
            mqtt_options.set_credentials(user, password);
        }
        if let Some(will) = &options.last_will {
            debug!("Setting last will on {}", will.topic);
            mqtt_options.set_last_will(rumqttc::LastWill::new(
                &will.topic,
                will.message.as_bytes().to_vec(),
                will.qos.into(),
                will.retain,
            ));
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let mut network = NetworkOptions::new();
        network.set_connection_timeout(options.connection_timeout.as_secs());
        eventloop.set_network_options(network);

        let cancel = CancellationToken::new();
        tokio::spawn(poll_eventloop(
            eventloop,
            self.events.clone(),
            generation,
            cancel.clone(),
        ));

        self.client = Some(client);
        self.poller = Some(cancel);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), MqttError> {
        Ok(self.client()?.try_subscribe(topic, qos.into())?)
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        Ok(self.client()?.try_unsubscribe(topic)?)
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<(), MqttError> {
        Ok(self
            .client()?
            .try_publish(topic, qos.into(), retain, payload.to_vec())?)
    }

    fn disconnect(&mut self) -> Result<(), MqttError> {
        let result = self.client()?.try_disconnect();
        // The poll task exits on its own once the disconnect packet is out
        self.poller = None;
        self.client = None;
        Ok(result?)
    }
}

async fn poll_eventloop(
    mut eventloop: EventLoop,
    events: mpsc::Sender<TransportEvent>,
    generation: u64,
    cancel: CancellationToken,
) {
    let mut connected = false;

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("MQTT poll task {} cancelled", generation);
                break;
            }
            polled = eventloop.poll() => polled,
        };

        let kind = match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    connected = true;
                    TransportEventKind::ConnectSucceeded
                } else {
                    TransportEventKind::ConnectFailed(format!("{:?}", ack.code))
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => TransportEventKind::MessageArrived {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
                qos: publish.qos.into(),
                duplicate: publish.dup,
            },
            Ok(Event::Incoming(Packet::PubAck(_))) | Ok(Event::Incoming(Packet::PubComp(_))) => {
                TransportEventKind::DeliveryComplete
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT disconnect sent");
                break;
            }
            Ok(_) => continue,
            Err(e) if connected => TransportEventKind::ConnectionLost(Some(e.to_string())),
            Err(e) => TransportEventKind::ConnectFailed(e.to_string()),
        };

        let terminal = matches!(
            kind,
            TransportEventKind::ConnectFailed(_) | TransportEventKind::ConnectionLost(_)
        );
        if events.send(TransportEvent { generation, kind }).await.is_err() {
            warn!("MQTT event receiver dropped, stopping poll task");
            break;
        }
        if terminal {
            break;
        }
    }
}
