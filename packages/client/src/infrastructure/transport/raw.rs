//! Raw socket binding
//!
//! Connects to `{endpoint}/ws/chat/{roomId}`. The room is implied by the path,
//! so subscriptions are local handles only. Authentication is a JSON AUTH
//! frame sent right after the socket opens. The backend never acknowledges
//! it explicitly: it closes the socket on a bad token. The link is ready once
//! the first inbound frame arrives, or once the socket has stayed open for
//! [`AUTH_SETTLE`] in a quiet room.

use std::time::Duration;

use tracing::{debug, trace};

use super::socket::{InboundDecoder, SocketHandle, endpoint_url};
use crate::{
    domain::RoomId,
    infrastructure::dto::websocket::AuthFrame,
    realtime::{
        Channel, OpenRequest, SubscriptionRef, Transport, TransportError, TransportLink,
        TransportSink,
    },
};

/// Raw socket transport
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSocketTransport;

impl Transport for RawSocketTransport {
    fn open(
        &self,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportLink>, TransportError> {
        let url = endpoint_url(&request.endpoint, &format!("/ws/chat/{}", request.room_id))?;
        let socket = SocketHandle::spawn(url, sink, AuthGate::default());
        Ok(Box::new(RawLink {
            socket,
            room_id: request.room_id,
        }))
    }
}

/// How long an authenticated socket must stay open without traffic before
/// the AUTH frame counts as accepted
pub const AUTH_SETTLE: Duration = Duration::from_millis(500);

/// Passes frames through, reporting `ready` on the first sign the backend
/// kept the session
#[derive(Debug, Default)]
struct AuthGate {
    accepted: bool,
}

impl AuthGate {
    fn accept(&mut self, sink: &TransportSink, cause: &str) {
        if !self.accepted {
            self.accepted = true;
            debug!(generation = sink.generation(), cause, "Raw session accepted");
            sink.ready();
        }
    }
}

impl InboundDecoder for AuthGate {
    fn decode(&mut self, text: &str, sink: &TransportSink) -> Result<(), TransportError> {
        self.accept(sink, "first frame");
        sink.message(text);
        Ok(())
    }

    fn settle_after(&self) -> Option<Duration> {
        Some(AUTH_SETTLE)
    }

    fn settled(&mut self, sink: &TransportSink) {
        self.accept(sink, "socket stayed open");
    }
}

struct RawLink {
    socket: SocketHandle,
    room_id: RoomId,
}

impl TransportLink for RawLink {
    fn authenticate(&mut self, token: &str) -> Result<(), TransportError> {
        let frame = AuthFrame::new(token, self.room_id.as_str());
        let payload = serde_json::to_string(&frame)
            .map_err(|error| TransportError::Protocol(error.to_string()))?;
        self.socket.send_text(payload)
    }

    fn subscribe(
        &mut self,
        room_id: &RoomId,
        channel: Channel,
    ) -> Result<SubscriptionRef, TransportError> {
        Ok(SubscriptionRef::new(format!("{room_id}/{channel}")))
    }

    fn unsubscribe(&mut self, subscription: &SubscriptionRef) {
        trace!(subscription = %subscription, "Raw subscriptions end with the socket");
    }

    fn publish(
        &mut self,
        _room_id: &RoomId,
        _channel: Channel,
        payload: String,
    ) -> Result<(), TransportError> {
        self.socket.send_text(payload)
    }

    fn close(&mut self) {
        self.socket.close();
    }
}
