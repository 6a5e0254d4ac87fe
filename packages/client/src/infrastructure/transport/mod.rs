//! Transport bindings
//!
//! Two bindings implement the same `Transport` capability:
//!
//! - `raw`: one WebSocket per room, authenticated with a JSON AUTH frame
//! - `stomp`: STOMP 1.2 over a shared WebSocket endpoint, authenticated with a
//!   bearer token in the CONNECT frame

pub mod raw;
mod socket;
pub mod stomp;

use std::sync::Arc;

pub use raw::RawSocketTransport;
pub use stomp::StompTransport;

use crate::realtime::{Transport, TransportBinding};

/// Build the transport for a configured binding
pub fn for_binding(binding: TransportBinding) -> Arc<dyn Transport> {
    match binding {
        TransportBinding::Raw => Arc::new(RawSocketTransport),
        TransportBinding::Stomp => Arc::new(StompTransport),
    }
}
