//! Core domain models for the realtime chat client.

use super::{
    error::RoomLogError,
    value_object::{MessageId, RoomId, Timestamp, UserId},
};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// User identifier
    pub id: UserId,
    /// Display name
    pub username: String,
}

impl UserIdentity {
    /// Create a new user identity
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Authentication state owned by the session store.
///
/// The connection manager only reads it. A session without a token cannot
/// open a realtime connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Bearer token used to authenticate the realtime connection
    pub token: Option<String>,
    /// Identity of the signed-in user
    pub user: Option<UserIdentity>,
}

impl Session {
    /// Create a signed-in session
    pub fn signed_in(token: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            token: Some(token.into()),
            user: Some(user),
        }
    }

    /// Whether a token is present
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Author of a chat message as shown in the room log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Sender's user id
    pub id: UserId,
    /// Sender's display name
    pub username: String,
}

impl From<UserIdentity> for Sender {
    fn from(user: UserIdentity) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// A chat message as stored in a room's log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainMessage {
    /// Message id, unique within the room's log
    pub id: MessageId,
    /// Room the message belongs to
    pub chat_room_id: RoomId,
    /// Author
    pub sender: Sender,
    /// Message text (may be empty for file-only messages)
    pub message: String,
    /// Attached file, if any
    pub file_url: Option<String>,
    /// Creation time reported by the sender
    pub created_at: Timestamp,
    /// Whether the payload is end-to-end encrypted (carried, not enforced)
    pub encrypted: bool,
}

/// Insertion-ordered, append-only message log of one room
#[derive(Debug, Clone)]
pub struct RoomLog {
    room_id: RoomId,
    messages: Vec<DomainMessage>,
}

impl RoomLog {
    /// Create an empty log for the given room
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            messages: Vec::new(),
        }
    }

    /// Room this log belongs to
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Append a message at the end of the log
    ///
    /// # Errors
    ///
    /// Returns `RoomLogError::RoomMismatch` if the message belongs to another
    /// room, and `RoomLogError::DuplicateMessageId` if its id is already logged
    pub fn append(&mut self, message: DomainMessage) -> Result<(), RoomLogError> {
        if message.chat_room_id != self.room_id {
            return Err(RoomLogError::RoomMismatch {
                expected: self.room_id.to_string(),
                actual: message.chat_room_id.to_string(),
            });
        }
        if self.contains(&message.id) {
            return Err(RoomLogError::DuplicateMessageId {
                room_id: self.room_id.to_string(),
                message_id: message.id.to_string(),
            });
        }
        self.messages.push(message);
        Ok(())
    }

    /// Whether a message with this id is already logged
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// Messages in insertion order
    pub fn messages(&self) -> &[DomainMessage] {
        &self.messages
    }

    /// Number of logged messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
