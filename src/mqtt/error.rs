//! Error types of the MQTT bridge

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    /// Request rejected by the client library (queue full, client dropped)
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Operation attempted before a client was created
    #[error("No MQTT client")]
    NoClient,
}
