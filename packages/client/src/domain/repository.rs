//! Collaborator contracts consumed by the connection manager.
//!
//! The domain layer defines the traits; the infrastructure layer provides the
//! implementations (dependency inversion). The connection manager receives
//! them at construction instead of reaching into process-wide state.

use async_trait::async_trait;
use tokio::sync::watch;

use super::{DomainMessage, RoomId, RoomLogError, Session};

/// Read-only access to the authentication session.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Snapshot of the current session.
    fn current(&self) -> Session;

    /// Receiver notified whenever the session changes (sign-in, logout).
    fn subscribe(&self) -> watch::Receiver<Session>;
}

/// Ordered, append-only message logs, one per room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomMessageStore: Send + Sync {
    /// Append a message to the end of its room's log.
    async fn add_message(&self, message: DomainMessage) -> Result<(), RoomLogError>;

    /// Messages of a room in insertion order.
    async fn messages(&self, room_id: &RoomId) -> Vec<DomainMessage>;
}
