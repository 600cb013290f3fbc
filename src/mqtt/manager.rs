//! MQTT manager: the bridge's single connection and its listener
//!
//! The manager forwards calls to the [`MqttTransport`] and turns transport
//! events into [`MqttListener`] callbacks. It has no retry, queueing or
//! persistence of its own. Every request made while not connected is
//! dropped, and library failures are logged rather than returned.

use tracing::{debug, error, info, warn};

use super::config::{ConnectOptions, MqttSettings, Qos};
use super::message_manager::MqttMessage;
use super::state::{ConnectionStatus, MqttEvent};
use super::transport::{MqttTransport, TransportEvent, TransportEventKind};

/// Receives lifecycle and message events of the bridge.
///
/// Failed connects, lost connections and explicit disconnects all end in
/// [`MqttListener::on_disconnected`].
pub trait MqttListener: Send {
    fn on_connected(&mut self);
    fn on_disconnected(&mut self);
    fn on_message_arrived(&mut self, message: MqttMessage);
    /// User facing message, shown as a toast by the UI
    fn on_user_notice(&mut self, _notice: UserNotice) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    ConnectionFailed,
    ConnectionLost,
}

impl UserNotice {
    pub fn text(self) -> &'static str {
        match self {
            UserNotice::ConnectionFailed => "MQTT connection failed",
            UserNotice::ConnectionLost => "MQTT connection lost",
        }
    }
}

pub struct MqttManager<T: MqttTransport, L: MqttListener> {
    transport: T,
    listener: Option<L>,
    settings: MqttSettings,
    status: ConnectionStatus,
    /// Identifies the live client, bumped on every connect and disconnect
    generation: u64,
}

impl<T: MqttTransport, L: MqttListener> MqttManager<T, L> {
    pub fn new(transport: T, settings: MqttSettings) -> Self {
        Self {
            transport,
            listener: None,
            settings,
            status: ConnectionStatus::None,
            generation: 0,
        }
    }

    pub fn set_listener(&mut self, listener: L) {
        self.listener = Some(listener);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn apply(&mut self, event: MqttEvent) -> ConnectionStatus {
        let previous = self.status;
        self.status = previous.next(event);
        debug!("Mqtt: {:?} --{:?}--> {:?}", previous, event, self.status);
        previous
    }

    fn notify(&mut self, f: impl FnOnce(&mut L)) {
        if let Some(listener) = self.listener.as_mut() {
            f(listener);
        }
    }

    pub fn connect_from_settings(&mut self) {
        let host = self.settings.host.clone();
        let port = self.settings.port;
        self.connect(&host, port);
    }

    /// Starts connecting to `host:port` with the fixed connection options.
    pub fn connect(&mut self, host: &str, port: u16) {
        let options = ConnectOptions::new(host, port, &self.settings);
        self.generation += 1;

        info!("Mqtt: connect to {}", options.uri());
        self.apply(MqttEvent::ConnectRequested);
        if let Err(e) = self.transport.connect(&options, self.generation) {
            error!("Mqtt:x connection error: {}", e);
        }
    }

    /// Marks the connection as disconnected right away; the library's
    /// acknowledgement is not waited for.
    pub fn disconnect(&mut self) {
        if !self.status.is_connected() {
            return;
        }
        info!("Mqtt: disconnect");
        self.apply(MqttEvent::DisconnectRequested);
        self.generation += 1;
        if let Err(e) = self.transport.disconnect() {
            error!("Mqtt:x disconnection error: {}", e);
        }
    }

    pub fn subscribe(&mut self, topic: &str, qos: Qos) {
        if !self.status.is_connected() {
            return;
        }
        debug!("Mqtt: subscribe to {} qos:{:?}", topic, qos);
        if let Err(e) = self.transport.subscribe(topic, qos) {
            error!("Mqtt:x subscribe error: {}", e);
        }
    }

    pub fn unsubscribe(&mut self, topic: &str) {
        if !self.status.is_connected() {
            return;
        }
        debug!("Mqtt: unsubscribe from {}", topic);
        if let Err(e) = self.transport.unsubscribe(topic) {
            error!("Mqtt:x unsubscribe error: {}", e);
        }
    }

    /// Publishes without retain
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) {
        if !self.status.is_connected() {
            return;
        }
        debug!("Mqtt: publish {} bytes for topic {} qos:{:?}", payload.len(), topic, qos);
        if let Err(e) = self.transport.publish(topic, payload, qos, false) {
            error!("Mqtt:x publish error: {}", e);
        }
    }

    /// Applies an event reported by the transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if event.generation != self.generation {
            debug!(
                "Mqtt: dropping event of released client {} (live {})",
                event.generation, self.generation
            );
            return;
        }

        match event.kind {
            TransportEventKind::ConnectSucceeded => self.on_success(),
            TransportEventKind::ConnectFailed(reason) => {
                warn!("Mqtt onFailure: {}", reason);
                self.apply(MqttEvent::ActionFailed);
                self.notify(|l| l.on_disconnected());
                self.notify(|l| l.on_user_notice(UserNotice::ConnectionFailed));
            }
            TransportEventKind::ConnectionLost(reason) => {
                info!("Mqtt connectionLost: {:?}", reason);
                self.apply(MqttEvent::ConnectionLost);
                self.notify(|l| l.on_disconnected());
                // A plain close carries no error and gets no notice
                if reason.is_some() {
                    self.notify(|l| l.on_user_notice(UserNotice::ConnectionLost));
                }
            }
            TransportEventKind::MessageArrived {
                topic,
                payload,
                qos,
                duplicate,
            } => {
                let message = MqttMessage::from_topic(topic, payload, qos, duplicate);
                debug!(
                    "Mqtt messageArrived from topic: {} message: {} isDuplicate: {}",
                    message.topic,
                    message.content(),
                    if duplicate { "yes" } else { "no" }
                );
                self.notify(|l| l.on_message_arrived(message));
            }
            TransportEventKind::DeliveryComplete => debug!("Mqtt deliveryComplete"),
        }
    }

    fn on_success(&mut self) {
        match self.apply(MqttEvent::ActionSucceeded) {
            ConnectionStatus::Connecting => {
                debug!("Mqtt connect onSuccess");
                self.notify(|l| l.on_connected());
                if let Some(topic) = self.settings.auto_subscribe_topic().map(str::to_string) {
                    self.subscribe(&topic, Qos::ExactlyOnce);
                }
            }
            ConnectionStatus::Disconnecting => {
                debug!("Mqtt disconnect onSuccess");
                self.notify(|l| l.on_disconnected());
            }
            _ => debug!("Mqtt unknown onSuccess"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mqtt::error::MqttError;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Connect(ConnectOptions, u64),
        Subscribe(String, Qos),
        Unsubscribe(String),
        Publish(String, Vec<u8>, Qos, bool),
        Disconnect,
    }

    #[derive(Default)]
    pub struct FakeTransport {
        pub calls: Vec<Call>,
        pub fail: bool,
    }

    impl FakeTransport {
        fn record(&mut self, call: Call) -> Result<(), MqttError> {
            self.calls.push(call);
            if self.fail {
                Err(MqttError::NoClient)
            } else {
                Ok(())
            }
        }
    }

    impl MqttTransport for FakeTransport {
        fn connect(&mut self, options: &ConnectOptions, generation: u64) -> Result<(), MqttError> {
            self.record(Call::Connect(options.clone(), generation))
        }
        fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), MqttError> {
            self.record(Call::Subscribe(topic.to_string(), qos))
        }
        fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
            self.record(Call::Unsubscribe(topic.to_string()))
        }
        fn publish(
            &mut self,
            topic: &str,
            payload: &[u8],
            qos: Qos,
            retain: bool,
        ) -> Result<(), MqttError> {
            self.record(Call::Publish(topic.to_string(), payload.to_vec(), qos, retain))
        }
        fn disconnect(&mut self) -> Result<(), MqttError> {
            self.record(Call::Disconnect)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Heard {
        Connected,
        Disconnected,
        Message(String, String),
        Notice(UserNotice),
    }

    #[derive(Default)]
    pub struct RecordingListener {
        pub heard: Vec<Heard>,
    }

    impl MqttListener for RecordingListener {
        fn on_connected(&mut self) {
            self.heard.push(Heard::Connected);
        }
        fn on_disconnected(&mut self) {
            self.heard.push(Heard::Disconnected);
        }
        fn on_message_arrived(&mut self, message: MqttMessage) {
            self.heard.push(Heard::Message(message.topic.clone(), message.content()));
        }
        fn on_user_notice(&mut self, notice: UserNotice) {
            self.heard.push(Heard::Notice(notice));
        }
    }

    fn manager(settings: MqttSettings) -> MqttManager<FakeTransport, RecordingListener> {
        let mut manager = MqttManager::new(FakeTransport::default(), settings);
        manager.set_listener(RecordingListener::default());
        manager
    }

    fn event(generation: u64, kind: TransportEventKind) -> TransportEvent {
        TransportEvent { generation, kind }
    }

    fn heard(m: &MqttManager<FakeTransport, RecordingListener>) -> &[Heard] {
        &m.listener.as_ref().unwrap().heard
    }

    #[test]
    fn requests_before_connecting_make_no_library_call() {
        let mut m = manager(MqttSettings::default());
        m.publish("t", b"x", Qos::AtMostOnce);
        m.subscribe("t", Qos::AtLeastOnce);
        m.unsubscribe("t");
        m.disconnect();
        assert!(m.transport().calls.is_empty());
        assert_eq!(m.status(), ConnectionStatus::None);

        m.connect("broker", 1883);
        m.publish("t", b"x", Qos::AtMostOnce);
        assert_eq!(m.status(), ConnectionStatus::Connecting);
        assert_eq!(m.transport().calls.len(), 1);
    }

    #[test]
    fn connect_success_subscribes_when_configured() {
        let settings = MqttSettings {
            subscribe_topic: Some("bluefruit/in".to_string()),
            subscribe_enabled: true,
            ..MqttSettings::default()
        };
        let mut m = manager(settings);
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));

        assert_eq!(m.status(), ConnectionStatus::Connected);
        assert_eq!(heard(&m), &[Heard::Connected]);
        assert_eq!(
            m.transport().calls.last(),
            Some(&Call::Subscribe("bluefruit/in".to_string(), Qos::ExactlyOnce))
        );
    }

    #[test]
    fn connect_success_without_enabled_subscription_does_not_subscribe() {
        let settings = MqttSettings {
            subscribe_topic: Some("bluefruit/in".to_string()),
            subscribe_enabled: false,
            ..MqttSettings::default()
        };
        let mut m = manager(settings);
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));

        assert_eq!(m.status(), ConnectionStatus::Connected);
        assert_eq!(m.transport().calls.len(), 1);
    }

    #[test]
    fn connected_requests_reach_the_library() {
        let mut m = manager(MqttSettings::default());
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));
        m.publish("out", b"hello", Qos::AtLeastOnce);
        m.subscribe("in", Qos::AtMostOnce);
        m.unsubscribe("in");

        assert_eq!(
            &m.transport().calls[1..],
            &[
                Call::Publish("out".to_string(), b"hello".to_vec(), Qos::AtLeastOnce, false),
                Call::Subscribe("in".to_string(), Qos::AtMostOnce),
                Call::Unsubscribe("in".to_string()),
            ]
        );
    }

    #[test]
    fn library_failures_are_swallowed() {
        let mut m = manager(MqttSettings::default());
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));
        m.transport.fail = true;
        m.publish("out", b"hello", Qos::AtMostOnce);
        assert_eq!(m.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn connect_failure_reports_error_and_notice() {
        let mut m = manager(MqttSettings::default());
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectFailed("refused".into())));

        assert_eq!(m.status(), ConnectionStatus::Error);
        assert_eq!(
            heard(&m),
            &[Heard::Disconnected, Heard::Notice(UserNotice::ConnectionFailed)]
        );
    }

    #[test]
    fn loss_notice_only_with_an_error() {
        let mut m = manager(MqttSettings::default());
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));
        m.handle_transport_event(event(1, TransportEventKind::ConnectionLost(None)));
        assert_eq!(m.status(), ConnectionStatus::Disconnected);
        assert_eq!(heard(&m), &[Heard::Connected, Heard::Disconnected]);

        m.connect("broker", 1883);
        m.handle_transport_event(event(2, TransportEventKind::ConnectSucceeded));
        m.handle_transport_event(event(2, TransportEventKind::ConnectionLost(Some("reset".into()))));
        assert_eq!(
            &heard(&m)[2..],
            &[
                Heard::Connected,
                Heard::Disconnected,
                Heard::Notice(UserNotice::ConnectionLost)
            ]
        );
    }

    #[test]
    fn disconnect_is_optimistic_and_ignores_late_events() {
        let mut m = manager(MqttSettings::default());
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));
        m.disconnect();

        assert_eq!(m.status(), ConnectionStatus::Disconnected);
        assert_eq!(m.transport().calls.last(), Some(&Call::Disconnect));

        // The released client's close must not touch the state
        m.handle_transport_event(event(1, TransportEventKind::ConnectionLost(None)));
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));
        assert_eq!(m.status(), ConnectionStatus::Disconnected);
        assert_eq!(heard(&m), &[Heard::Connected]);
    }

    #[test]
    fn messages_are_forwarded_to_the_listener() {
        let mut m = manager(MqttSettings::default());
        m.connect("broker", 1883);
        m.handle_transport_event(event(1, TransportEventKind::ConnectSucceeded));
        m.handle_transport_event(event(
            1,
            TransportEventKind::MessageArrived {
                topic: "bluefruit/in".to_string(),
                payload: b"led on".to_vec(),
                qos: Qos::ExactlyOnce,
                duplicate: false,
            },
        ));
        assert_eq!(
            heard(&m).last(),
            Some(&Heard::Message("bluefruit/in".to_string(), "led on".to_string()))
        );
    }

    #[test]
    fn connect_from_settings_uses_configured_broker() {
        let settings = MqttSettings {
            host: "10.0.0.2".to_string(),
            port: 1884,
            ..MqttSettings::default()
        };
        let mut m = manager(settings);
        m.connect_from_settings();
        match &m.transport().calls[0] {
            Call::Connect(options, generation) => {
                assert_eq!(options.uri(), "tcp://10.0.0.2:1884");
                assert_eq!(*generation, 1);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}
