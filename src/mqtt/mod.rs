//! # MQTT Bridge Module
//!
//! Keeps a single connection to an MQTT broker and forwards its lifecycle and
//! incoming messages to a listener. All protocol work is done by `rumqttc`;
//! this module only decides *when* a request is allowed to reach the library
//! and translates what the library reports back.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Settings, QoS levels and the fixed connect options
//! ├── error.rs            - Error type of the transport layer
//! ├── manager.rs          - MqttManager and the MqttListener interface
//! ├── message_manager.rs  - Received message representation
//! ├── mqtt_handler.rs     - Task owning the manager, channel plumbing
//! ├── state.rs            - Connection state machine
//! └── transport.rs        - rumqttc seam
//! ```
//!
//! ## Behaviour
//!
//! - `publish`, `subscribe` and `unsubscribe` are dropped unless the state is
//!   `Connected`. Library errors are logged, never returned.
//! - After a successful connect the configured topic is subscribed with
//!   QoS 2 when subscription is enabled.
//! - `disconnect` moves to `Disconnected` immediately instead of waiting for
//!   the library's acknowledgement.
//! - Failed connects, lost connections and explicit disconnects all reach
//!   the listener as `on_disconnected`. Failures and losses with an error
//!   additionally raise a user notice.
//! - There is no reconnect, backoff or message queue.

pub mod config;
pub mod error;
pub mod manager;
pub mod message_manager;
pub mod mqtt_handler;
pub mod state;
pub mod transport;
