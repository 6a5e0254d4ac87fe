//! Transport capability consumed by the connection manager.
//!
//! A transport binding opens one link per connect cycle and reports
//! everything that happens on it through the [`TransportSink`] it was given.
//! Both bindings (raw socket, STOMP over WebSocket) plug in behind these
//! traits without changing the state machine.

use std::fmt;

use super::{
    error::TransportError,
    event::{EventSender, ManagerEvent, TransportEvent},
};
use crate::domain::RoomId;

/// Per-room channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Chat messages
    Chat,
    /// Typing notifications
    Typing,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => f.write_str("chat"),
            Self::Typing => f.write_str("typing"),
        }
    }
}

/// Opaque subscription handle issued by a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionRef(String);

impl SubscriptionRef {
    /// Wrap a binding-specific handle
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Binding-specific handle
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters for opening a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Backend base URL (e.g. `ws://localhost:8080`)
    pub endpoint: String,
    /// Room the link is opened for
    pub room_id: RoomId,
}

/// Reports events of one link back to the manager, tagged with its generation
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    events: EventSender,
}

impl TransportSink {
    /// Create a sink for the link opened under `generation`
    pub fn new(generation: u64, events: EventSender) -> Self {
        Self { generation, events }
    }

    /// Generation of the link this sink belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The connection is established
    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Authentication was accepted
    pub fn ready(&self) {
        self.emit(TransportEvent::Ready);
    }

    /// An inbound application frame
    pub fn message(&self, payload: impl Into<String>) {
        self.emit(TransportEvent::Message(payload.into()));
    }

    /// The peer closed the connection
    pub fn closed(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            reason: reason.into(),
        });
    }

    /// The connection failed
    pub fn failed(&self, error: TransportError) {
        self.emit(TransportEvent::Failed(error));
    }

    fn emit(&self, event: TransportEvent) {
        self.events.send(ManagerEvent::Transport {
            generation: self.generation,
            event,
        });
    }
}

/// A transport binding
pub trait Transport: Send + Sync {
    /// Start opening a link. Returns immediately; progress is reported
    /// through `sink` (`opened`, then `ready` after [`TransportLink::authenticate`]).
    fn open(
        &self,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportLink>, TransportError>;
}

/// One live link, exclusively owned by the manager
pub trait TransportLink: Send {
    /// Send credentials. The link reports `ready` once they are accepted.
    fn authenticate(&mut self, token: &str) -> Result<(), TransportError>;

    /// Subscribe to one of the room's channels
    fn subscribe(
        &mut self,
        room_id: &RoomId,
        channel: Channel,
    ) -> Result<SubscriptionRef, TransportError>;

    /// Drop a subscription. Best-effort.
    fn unsubscribe(&mut self, subscription: &SubscriptionRef);

    /// Publish a serialized frame on one of the room's channels
    fn publish(
        &mut self,
        room_id: &RoomId,
        channel: Channel,
        payload: String,
    ) -> Result<(), TransportError>;

    /// Close the link. Idempotent.
    fn close(&mut self);
}
