//! Realtime session configuration.

use super::backoff::BackoffPolicy;

/// Default backend base URL
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080";

/// Default capacity of the room activity broadcast
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 64;

/// Which transport binding to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportBinding {
    /// One WebSocket per room at `/ws/chat/{roomId}`, JSON AUTH frame
    Raw,
    /// STOMP over WebSocket at `/ws`, bearer token in the CONNECT frame
    #[default]
    Stomp,
}

/// Configuration of one realtime client
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Backend base URL (`ws://` or `wss://`)
    pub endpoint: String,
    /// Transport binding
    pub binding: TransportBinding,
    /// Reconnect backoff
    pub backoff: BackoffPolicy,
    /// Capacity of the room activity broadcast channel
    pub activity_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            binding: TransportBinding::default(),
            backoff: BackoffPolicy::default(),
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
        }
    }
}
