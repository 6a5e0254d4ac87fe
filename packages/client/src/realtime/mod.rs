//! Realtime session layer.
//!
//! The [`ConnectionManager`] state machine plus everything it is driven by:
//! backoff, reconnect scheduling, transport capability traits, event types
//! and the actor runtime that owns the manager.
//!
//! This is the use case layer of the crate: it sits between `domain` and
//! `infrastructure` the way `usecase` does in a server built on the same
//! layering, with `bin/client.rs` as the user interface on top.

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod manager;
pub mod normalize;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod transport;

pub use backoff::{BackoffPolicy, ReconnectState};
pub use config::{RealtimeConfig, TransportBinding};
pub use error::{ConnectError, DecodeError, ReconnectExhausted, SendError, TransportError};
pub use event::{EventSender, ManagerEvent, RoomActivity, TransportEvent};
pub use manager::{ConnectionManager, RoomSubscription};
pub use runtime::{RealtimeClient, RealtimeHandle};
pub use scheduler::{DeferredTask, Scheduler, TokioScheduler};
pub use state::ConnectionState;
pub use transport::{
    Channel, OpenRequest, SubscriptionRef, Transport, TransportLink, TransportSink,
};
