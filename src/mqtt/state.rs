//! Connection state machine of the MQTT bridge
//!
//! ```text
//!            ConnectRequested            ActionSucceeded
//! None ───────────────────► Connecting ─────────────────► Connected
//!   ▲                           │                            │
//!   │                      ActionFailed              DisconnectRequested
//!   │                           ▼                            ▼
//!   │                         Error                     Disconnected
//!   └── any state ──ConnectRequested──► Connecting  ◄── (ConnectionLost from anywhere)
//! ```
//!
//! `DisconnectRequested` lands directly in `Disconnected`: the library's
//! disconnect acknowledgement is not relied upon, so `Disconnecting` is only
//! left through a late `ActionSucceeded`.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    None,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Error,
}

/// Inputs that drive [`ConnectionStatus`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttEvent {
    /// `connect` was called
    ConnectRequested,
    /// `disconnect` was called
    DisconnectRequested,
    /// The library acknowledged the pending connect or disconnect
    ActionSucceeded,
    /// The library rejected the pending action
    ActionFailed,
    /// The connection dropped, with or without an error
    ConnectionLost,
}

impl ConnectionStatus {
    pub fn next(self, event: MqttEvent) -> ConnectionStatus {
        use ConnectionStatus::*;
        use MqttEvent::*;

        match (self, event) {
            (_, ConnectRequested) => Connecting,

            (Connected, DisconnectRequested) => Disconnected,
            (None | Connecting | Disconnecting | Disconnected | Error, DisconnectRequested) => self,

            (Connecting, ActionSucceeded) => Connected,
            (Disconnecting, ActionSucceeded) => Disconnected,
            (None | Connected | Disconnected | Error, ActionSucceeded) => self,

            (_, ActionFailed) => Error,
            (_, ConnectionLost) => Disconnected,
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            ConnectionStatus::None => "Not connected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnecting => "Disconnecting",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Error => "Error",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionStatus::*;
    use super::MqttEvent::*;
    use super::*;

    const ALL: [ConnectionStatus; 6] = [None, Connecting, Connected, Disconnecting, Disconnected, Error];

    #[test]
    fn connect_always_starts_connecting() {
        for status in ALL {
            assert_eq!(status.next(ConnectRequested), Connecting);
        }
    }

    #[test]
    fn success_only_completes_pending_actions() {
        assert_eq!(Connecting.next(ActionSucceeded), Connected);
        assert_eq!(Disconnecting.next(ActionSucceeded), Disconnected);
        for status in [None, Connected, Disconnected, Error] {
            assert_eq!(status.next(ActionSucceeded), status);
        }
    }

    #[test]
    fn disconnect_is_optimistic_and_only_from_connected() {
        assert_eq!(Connected.next(DisconnectRequested), Disconnected);
        for status in [None, Connecting, Disconnecting, Disconnected, Error] {
            assert_eq!(status.next(DisconnectRequested), status);
        }
    }

    #[test]
    fn failures_and_losses_are_absorbing() {
        for status in ALL {
            assert_eq!(status.next(ActionFailed), Error);
            assert_eq!(status.next(ConnectionLost), Disconnected);
        }
    }
}
