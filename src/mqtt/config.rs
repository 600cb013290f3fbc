use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection options that are not user configurable
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(1);
pub const KEEP_ALIVE: Duration = Duration::from_secs(10);
pub const CLEAN_SESSION: bool = true;
pub const DEFAULT_CLIENT_ID: &str = "Bluefruit";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

impl From<rumqttc::QoS> for Qos {
    fn from(qos: rumqttc::QoS) -> Self {
        match qos {
            rumqttc::QoS::AtMostOnce => Qos::AtMostOnce,
            rumqttc::QoS::AtLeastOnce => Qos::AtLeastOnce,
            rumqttc::QoS::ExactlyOnce => Qos::ExactlyOnce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastWill {
    pub topic: String,
    pub message: String,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default)]
    pub retain: bool,
}

/// `[mqtt]` section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Connect as soon as the application starts
    pub connect_on_start: bool,
    /// Topic subscribed automatically once connected
    pub subscribe_topic: Option<String>,
    pub subscribe_enabled: bool,
    /// Topic characteristic values are published to, `{characteristic}` is
    /// replaced by the characteristic UUID
    pub publish_topic: Option<String>,
    pub publish_enabled: bool,
    pub publish_qos: Qos,
    pub last_will: Option<LastWill>,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            connect_on_start: false,
            subscribe_topic: None,
            subscribe_enabled: false,
            publish_topic: None,
            publish_enabled: false,
            publish_qos: Qos::AtMostOnce,
            last_will: None,
        }
    }
}

impl MqttSettings {
    /// Topic for the auto-subscribe after connecting, if enabled and set
    pub fn auto_subscribe_topic(&self) -> Option<&str> {
        if !self.subscribe_enabled {
            return None;
        }
        self.subscribe_topic.as_deref().filter(|t| !t.is_empty())
    }
}

/// Library independent connect options built from the settings
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub clean_session: bool,
    pub connection_timeout: Duration,
    pub keep_alive: Duration,
    pub credentials: Option<(String, String)>,
    pub last_will: Option<LastWill>,
}

impl ConnectOptions {
    pub fn new(host: &str, port: u16, settings: &MqttSettings) -> Self {
        let username = settings.username.clone().filter(|u| !u.is_empty());
        let credentials = username.map(|user| {
            let password = settings.password.clone().unwrap_or_default();
            (user, password)
        });
        // A will is only set when it carries a topic
        let last_will = settings
            .last_will
            .clone()
            .filter(|will| !will.topic.is_empty());

        Self {
            host: host.to_string(),
            port,
            client_id: settings.client_id.clone(),
            clean_session: CLEAN_SESSION,
            connection_timeout: CONNECTION_TIMEOUT,
            keep_alive: KEEP_ALIVE,
            credentials,
            last_will,
        }
    }

    /// `tcp://host:port`, TLS is not supported
    pub fn uri(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}
