//! Mapping between wire frames and the client's message model.

use super::{error::DecodeError, event::RoomActivity};
use crate::{
    domain::{
        DomainMessage, MessageId, MessageIdFactory, RoomId, Sender, Timestamp, UserIdentity,
        UserId,
    },
    infrastructure::dto::websocket::{FrameType, WireFrame},
};

/// Decode one inbound JSON frame.
pub fn decode_frame(payload: &str) -> Result<WireFrame, DecodeError> {
    Ok(serde_json::from_str(payload)?)
}

/// Normalize a `CHAT` frame into a [`DomainMessage`].
///
/// The wire id is used when present and valid, otherwise one is generated.
/// Inbound messages are never marked encrypted.
pub fn to_domain_message(frame: WireFrame) -> Result<DomainMessage, DecodeError> {
    let created_at = parse_created_at(&frame.created_at)?;
    let id = frame
        .id
        .and_then(|id| MessageId::new(id).ok())
        .unwrap_or_else(MessageIdFactory::generate);

    Ok(DomainMessage {
        id,
        chat_room_id: room_id(frame.chat_room_id)?,
        sender: sender(frame.sender_id, frame.sender_username)?,
        message: frame.message,
        file_url: frame.file_url,
        created_at,
        encrypted: false,
    })
}

/// Normalize a `JOIN` / `LEAVE` / `TYPING` frame into a [`RoomActivity`].
pub fn to_activity(frame: WireFrame) -> Result<RoomActivity, DecodeError> {
    let room_id = room_id(frame.chat_room_id)?;
    let user = sender(frame.sender_id, frame.sender_username)?;
    match frame.r#type {
        FrameType::Join => Ok(RoomActivity::Joined { room_id, user }),
        FrameType::Leave => Ok(RoomActivity::Left { room_id, user }),
        FrameType::Typing => Ok(RoomActivity::Typing {
            room_id,
            user,
            at: parse_created_at(&frame.created_at)?,
        }),
        other => Err(DecodeError::UnexpectedType(other)),
    }
}

/// Build an outbound frame stamped with the sender's identity and `now`.
pub fn outbound_frame(
    frame_type: FrameType,
    room_id: &RoomId,
    user: &UserIdentity,
    message: &str,
    file_url: Option<String>,
    now: Timestamp,
) -> WireFrame {
    WireFrame {
        id: None,
        chat_room_id: room_id.to_string(),
        sender_id: user.id.to_string(),
        sender_username: user.username.clone(),
        message: message.to_string(),
        file_url,
        created_at: now.to_iso8601(),
        r#type: frame_type,
    }
}

fn parse_created_at(value: &str) -> Result<Timestamp, DecodeError> {
    Timestamp::parse(value).ok_or_else(|| DecodeError::InvalidTimestamp(value.to_string()))
}

fn room_id(value: String) -> Result<RoomId, DecodeError> {
    RoomId::new(value).map_err(|e| DecodeError::InvalidField {
        field: "chatRoomId",
        reason: e.to_string(),
    })
}

fn sender(id: String, username: String) -> Result<Sender, DecodeError> {
    let id = UserId::new(id).map_err(|e| DecodeError::InvalidField {
        field: "senderId",
        reason: e.to_string(),
    })?;
    Ok(Sender { id, username })
}
