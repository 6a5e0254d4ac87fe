//! Realtime wire frame DTOs.
//!
//! Both directions use the same JSON shape:
//!
//! ```text
//! { chatRoomId, senderId, senderUsername, message, fileUrl?, createdAt, type }
//! ```
//!
//! Ids may arrive as JSON strings or numbers; they are kept as strings.

use serde::{Deserialize, Deserializer, Serialize};

/// Frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameType {
    Chat,
    Join,
    Leave,
    Typing,
    Auth,
}

/// Chat, presence and typing frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFrame {
    /// Message id, when the backend provides one
    #[serde(
        default,
        deserialize_with = "optional_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(deserialize_with = "id_string")]
    pub chat_room_id: String,
    #[serde(deserialize_with = "id_string")]
    pub sender_id: String,
    #[serde(default)]
    pub sender_username: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// ISO-8601, with or without offset
    pub created_at: String,
    pub r#type: FrameType,
}

/// Authentication frame sent by the raw-socket binding right after open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFrame {
    pub r#type: FrameType,
    pub token: String,
    pub chat_room_id: String,
}

impl AuthFrame {
    /// Create an AUTH frame for the given room
    pub fn new(token: impl Into<String>, chat_room_id: impl Into<String>) -> Self {
        Self {
            r#type: FrameType::Auth,
            token: token.into(),
            chat_room_id: chat_room_id.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Integer(number) => number.to_string(),
        }
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}
