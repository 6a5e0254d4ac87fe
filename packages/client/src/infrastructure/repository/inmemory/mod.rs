//! インメモリ実装

mod room;
mod session;

pub use room::InMemoryRoomMessageStore;
pub use session::InMemorySessionStore;
