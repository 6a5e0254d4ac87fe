//! STOMP over WebSocket binding
//!
//! Connects to `{endpoint}/ws` and speaks STOMP 1.2:
//!
//! | Step         | Frame                                                     |
//! |--------------|-----------------------------------------------------------|
//! | authenticate | `CONNECT` with `Authorization: Bearer <token>`            |
//! | ready        | `CONNECTED` from the broker                               |
//! | subscribe    | `SUBSCRIBE /topic/chat/{room}` and `/topic/chat/{room}/typing` |
//! | publish      | `SEND /app/chat/{room}` and `/app/chat/{room}/typing`     |
//! | inbound      | `MESSAGE` body is one JSON wire frame                     |
//! | close        | `UNSUBSCRIBE` per subscription, then `DISCONNECT`         |
//!
//! An `ERROR` frame from the broker fails the link.

mod frame;

use tracing::{debug, trace, warn};

pub use frame::{StompCommand, StompError, StompFrame};

use super::socket::{InboundDecoder, SocketHandle, endpoint_url};
use crate::{
    domain::RoomId,
    realtime::{
        Channel, OpenRequest, SubscriptionRef, Transport, TransportError, TransportLink,
        TransportSink,
    },
};

const STOMP_PATH: &str = "/ws";
const ACCEPT_VERSION: &str = "1.2";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Broker topic a room channel is delivered on
pub fn topic(room_id: &RoomId, channel: Channel) -> String {
    match channel {
        Channel::Chat => format!("/topic/chat/{room_id}"),
        Channel::Typing => format!("/topic/chat/{room_id}/typing"),
    }
}

/// Application destination a room channel is published to
pub fn destination(room_id: &RoomId, channel: Channel) -> String {
    match channel {
        Channel::Chat => format!("/app/chat/{room_id}"),
        Channel::Typing => format!("/app/chat/{room_id}/typing"),
    }
}

/// STOMP over WebSocket transport
#[derive(Debug, Clone, Copy, Default)]
pub struct StompTransport;

impl Transport for StompTransport {
    fn open(
        &self,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportLink>, TransportError> {
        let url = endpoint_url(&request.endpoint, STOMP_PATH)?;
        let host = host_of(&request.endpoint);
        let socket = SocketHandle::spawn(url, sink, StompDecoder);
        Ok(Box::new(StompLink {
            socket,
            host,
            next_subscription: 0,
            connected: false,
        }))
    }
}

/// Host part of the endpoint, used as the CONNECT `host` header
fn host_of(endpoint: &str) -> String {
    let authority = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, rest)| rest)
        .split('/')
        .next()
        .unwrap_or_default();
    match authority.rsplit_once(':') {
        Some((host, port))
            if !port.is_empty()
                && port.bytes().all(|byte| byte.is_ascii_digit())
                && (host.ends_with(']') || !host.contains('[')) =>
        {
            host.to_string()
        }
        _ => authority.to_string(),
    }
}

struct StompDecoder;

impl InboundDecoder for StompDecoder {
    fn decode(&mut self, text: &str, sink: &TransportSink) -> Result<(), TransportError> {
        let frame = match StompFrame::decode(text) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!("STOMP heart-beat");
                return Ok(());
            }
            Err(error) => {
                warn!(%error, "Dropping malformed STOMP frame");
                return Ok(());
            }
        };

        match frame.command {
            StompCommand::Connected => {
                debug!(version = ?frame.get("version"), "STOMP session established");
                sink.ready();
            }
            StompCommand::Message => sink.message(frame.body),
            StompCommand::Error => {
                let message = frame
                    .get("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| frame.body.clone());
                return Err(TransportError::Protocol(message));
            }
            StompCommand::Receipt => trace!(receipt = ?frame.get("receipt-id"), "STOMP receipt"),
            other => debug!(command = %other, "Ignoring unexpected STOMP frame"),
        }
        Ok(())
    }
}

struct StompLink {
    socket: SocketHandle,
    host: String,
    next_subscription: u64,
    connected: bool,
}

impl StompLink {
    fn send(&self, frame: StompFrame) -> Result<(), TransportError> {
        self.socket.send_text(frame.encode())
    }
}

impl TransportLink for StompLink {
    fn authenticate(&mut self, token: &str) -> Result<(), TransportError> {
        let connect = StompFrame::new(StompCommand::Connect)
            .header("accept-version", ACCEPT_VERSION)
            .header("host", self.host.as_str())
            .header("heart-beat", "0,0")
            .header("Authorization", format!("Bearer {token}"));
        self.send(connect)?;
        self.connected = true;
        Ok(())
    }

    fn subscribe(
        &mut self,
        room_id: &RoomId,
        channel: Channel,
    ) -> Result<SubscriptionRef, TransportError> {
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        let subscribe = StompFrame::new(StompCommand::Subscribe)
            .header("id", id.as_str())
            .header("destination", topic(room_id, channel))
            .header("ack", "auto");
        self.send(subscribe)?;
        Ok(SubscriptionRef::new(id))
    }

    fn unsubscribe(&mut self, subscription: &SubscriptionRef) {
        let unsubscribe =
            StompFrame::new(StompCommand::Unsubscribe).header("id", subscription.as_str());
        if let Err(error) = self.send(unsubscribe) {
            debug!(%error, subscription = %subscription, "UNSUBSCRIBE not sent");
        }
    }

    fn publish(
        &mut self,
        room_id: &RoomId,
        channel: Channel,
        payload: String,
    ) -> Result<(), TransportError> {
        let send = StompFrame::new(StompCommand::Send)
            .header("destination", destination(room_id, channel))
            .header("content-type", JSON_CONTENT_TYPE)
            .body(payload);
        self.send(send)
    }

    fn close(&mut self) {
        if self.connected {
            self.connected = false;
            if let Err(error) = self.send(StompFrame::new(StompCommand::Disconnect)) {
                debug!(%error, "DISCONNECT not sent");
            }
        }
        self.socket.close();
    }
}
