//! Domain layer for the realtime chat client.
//!
//! This module contains the message model and collaborator contracts that are
//! independent of the wire format and the transport.

pub mod entity;
pub mod error;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use entity::{DomainMessage, RoomLog, Sender, Session, UserIdentity};
pub use error::{RoomLogError, ValueObjectError};
pub use factory::MessageIdFactory;
pub use repository::{RoomMessageStore, SessionStore};
pub use value_object::{MessageId, RoomId, Timestamp, UserId};

#[cfg(test)]
pub use repository::{MockRoomMessageStore, MockSessionStore};
