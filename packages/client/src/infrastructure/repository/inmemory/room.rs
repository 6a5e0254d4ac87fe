//! InMemory Room Message Store 実装
//!
//! ドメイン層が定義する RoomMessageStore trait の具体的な実装。
//! HashMap をルームごとのメッセージログとして使用します。
//! 永続化は行いません（履歴のバックフィルは REST 層の責務）。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{DomainMessage, RoomId, RoomLog, RoomLogError, RoomMessageStore};

/// インメモリ Room Message Store 実装
///
/// ルームごとに挿入順のログを保持し、同一ルーム内での ID 重複を拒否します。
#[derive(Default)]
pub struct InMemoryRoomMessageStore {
    /// ルーム ID ごとのメッセージログ
    rooms: Mutex<HashMap<RoomId, RoomLog>>,
}

impl InMemoryRoomMessageStore {
    /// 新しい InMemoryRoomMessageStore を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ルームのメッセージ件数を取得
    pub async fn count(&self, room_id: &RoomId) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).map_or(0, RoomLog::len)
    }
}

#[async_trait]
impl RoomMessageStore for InMemoryRoomMessageStore {
    async fn add_message(&self, message: DomainMessage) -> Result<(), RoomLogError> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(message.chat_room_id.clone())
            .or_insert_with(|| RoomLog::new(message.chat_room_id.clone()))
            .append(message)
    }

    async fn messages(&self, room_id: &RoomId) -> Vec<DomainMessage> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|log| log.messages().to_vec())
            .unwrap_or_default()
    }
}
