//! Error taxonomy of the realtime session.
//!
//! Caller misuse (`AuthMissing`, `NotConnected`) is reported synchronously and
//! never retried. Transport failures are recovered locally through backoff and
//! never surface to callers; decode failures drop a single frame.

use thiserror::Error;

use crate::infrastructure::dto::websocket::FrameType;

/// Errors returned by `connect`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// No auth token in the session; the caller must re-authenticate first
    #[error("cannot connect: no authentication token in session")]
    AuthMissing,

    /// The realtime client task is no longer running
    #[error("realtime client has stopped")]
    ClientStopped,
}

/// Errors returned by `send_message`
#[derive(Debug, Error)]
pub enum SendError {
    /// Not connected, or no current room/user
    #[error("cannot send: not connected to a chat room")]
    NotConnected,

    /// The outbound frame could not be serialized
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport refused the publish
    #[error("transport rejected the message: {0}")]
    Transport(#[from] TransportError),

    /// The realtime client task is no longer running
    #[error("realtime client has stopped")]
    ClientStopped,
}

/// Transport-level failures. These trigger the backoff path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint URL or request could not be built
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Establishing the connection failed
    #[error("connection failed: {0}")]
    Connect(String),

    /// Writing to the connection failed
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the connection failed
    #[error("receive failed: {0}")]
    Receive(String),

    /// The peer reported a protocol-level error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection was closed
    #[error("connection closed: {0}")]
    Closed(String),
}

/// A malformed inbound frame. Logged, the frame is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not valid JSON or not the expected shape
    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field failed domain validation
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// `createdAt` is not an ISO-8601 timestamp
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    /// A frame type that is only valid outbound
    #[error("unexpected inbound frame type {0:?}")]
    UnexpectedType(FrameType),
}

/// Terminal reason carried by the `Failed` state
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("reconnect attempts exhausted after {attempts} tries")]
pub struct ReconnectExhausted {
    /// Attempts made before giving up
    pub attempts: u32,
}
