use std::fmt;

use serde::Serialize;

/// Lifecycle of the broker connection.
///
/// `Disconnected → Connecting → Connected → (Disconnected | Connecting)`.
/// `Closed` is terminal and only reached through an explicit shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Current state plus the number of connections established so far.
///
/// `epoch` grows by one each time the state becomes `Connected`, so a
/// watcher that only sees the latest value can still tell a fresh
/// connection from the one it already knew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub epoch: u64,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
        }
    }
}
