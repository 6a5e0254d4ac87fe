//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// RoomId validation error
    #[error("RoomId cannot be empty")]
    RoomIdEmpty,

    /// RoomId too long error
    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    /// UserId validation error
    #[error("UserId cannot be empty")]
    UserIdEmpty,

    /// UserId too long error
    #[error("UserId cannot exceed {max} characters (got {actual})")]
    UserIdTooLong { max: usize, actual: usize },

    /// MessageId validation error
    #[error("MessageId cannot be empty")]
    MessageIdEmpty,

    /// MessageId too long error
    #[error("MessageId cannot exceed {max} characters (got {actual})")]
    MessageIdTooLong { max: usize, actual: usize },
}

/// Errors related to the per-room message log
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomLogError {
    /// A message with the same id is already in the room's log
    #[error("Message '{message_id}' is already in the log of room '{room_id}'")]
    DuplicateMessageId { room_id: String, message_id: String },

    /// The message belongs to a different room than the log
    #[error("Message for room '{actual}' cannot be appended to the log of room '{expected}'")]
    RoomMismatch { expected: String, actual: String },
}
