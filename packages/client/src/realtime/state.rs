//! Observable connection state.

use std::fmt;

/// Connection state exposed to the UI.
///
/// Exactly one value per manager at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no pending reconnect
    Disconnected,
    /// Caller-initiated connect in progress (open, authenticate, subscribe)
    Connecting,
    /// Authenticated and subscribed to the room's channels
    Connected,
    /// Connection lost; a backoff timer or reconnect handshake is in flight
    Reconnecting,
    /// Reconnect attempts exhausted; only an explicit connect recovers
    Failed,
}

impl ConnectionState {
    /// Whether messages can be published
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
