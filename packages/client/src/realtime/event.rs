//! Events that re-enter the connection manager, and events it emits.
//!
//! The manager is only ever entered through [`ManagerEvent`]s delivered on a
//! single channel: transport callbacks and reconnect timer firings. Every
//! event carries the generation of the transport (or timer) that produced it
//! so callbacks from a superseded transport can be recognised and ignored.

use tokio::sync::mpsc;

use super::error::TransportError;
use crate::domain::{RoomId, Sender, Timestamp};

/// Callback from a transport link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying connection is established
    Opened,
    /// Authentication was accepted; subscriptions may be issued
    Ready,
    /// One inbound application frame (JSON text)
    Message(String),
    /// The peer closed the connection
    Closed { reason: String },
    /// The connection failed
    Failed(TransportError),
}

/// Everything that re-enters the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Callback from the transport opened with `generation`
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    /// The reconnect timer scheduled under `generation` fired
    ReconnectDue { generation: u64 },
}

/// Sending half of the manager's event channel
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<ManagerEvent>);

impl EventSender {
    /// Create the event channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Deliver an event. Returns `false` if the manager is gone.
    pub fn send(&self, event: ManagerEvent) -> bool {
        if self.0.send(event).is_err() {
            tracing::debug!("Realtime event dropped: manager is no longer running");
            return false;
        }
        true
    }
}

/// Presentation-only room signal. Never appended to the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomActivity {
    /// A user joined the room
    Joined { room_id: RoomId, user: Sender },
    /// A user left the room
    Left { room_id: RoomId, user: Sender },
    /// A user is typing
    Typing {
        room_id: RoomId,
        user: Sender,
        at: Timestamp,
    },
}

impl RoomActivity {
    /// The user the signal is about
    pub fn user(&self) -> &Sender {
        match self {
            Self::Joined { user, .. } | Self::Left { user, .. } | Self::Typing { user, .. } => user,
        }
    }

    /// The room the signal belongs to
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Joined { room_id, .. }
            | Self::Left { room_id, .. }
            | Self::Typing { room_id, .. } => room_id,
        }
    }
}
