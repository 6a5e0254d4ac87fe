//! Realtime messaging session manager for Kasper chat rooms.
//!
//! Keeps one live connection to the chat backend per client, authenticates
//! it with the session's bearer token, subscribes to a room's chat and typing
//! channels, appends incoming messages to the room log and reconnects with
//! capped exponential backoff.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kasper_client::{
//!     domain::{RoomId, UserId, UserIdentity},
//!     infrastructure::repository::{InMemoryRoomMessageStore, InMemorySessionStore},
//!     realtime::{RealtimeClient, RealtimeConfig},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let user = UserIdentity::new(UserId::try_from("u1")?, "alice");
//! let session = Arc::new(InMemorySessionStore::signed_in("jwt", user));
//! let store = Arc::new(InMemoryRoomMessageStore::new());
//!
//! let client = RealtimeClient::spawn(RealtimeConfig::default(), session, store);
//! client.connect(RoomId::try_from("general")?).await?;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod realtime;

#[cfg(test)]
pub(crate) mod testing;
