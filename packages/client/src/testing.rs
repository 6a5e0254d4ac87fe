//! テスト用のフェイク実装
//!
//! Transport / Scheduler の呼び出しを記録するフェイクと、
//! 接続マネージャをイベントチャネルごと駆動するハーネスを提供します。

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc;

use crate::{
    domain::{RoomId, RoomMessageStore, SessionStore, UserId, UserIdentity},
    infrastructure::repository::{InMemoryRoomMessageStore, InMemorySessionStore},
    realtime::{
        Channel, ConnectionManager, DeferredTask, EventSender, ManagerEvent,
        OpenRequest, RealtimeConfig, Scheduler, SubscriptionRef, Transport, TransportError,
        TransportLink, TransportSink,
    },
};

/// フェイクリンクに対して行われた操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Authenticate(String),
    Subscribe(SubscriptionRef),
    Unsubscribe(SubscriptionRef),
    Publish(Channel, String),
    Close,
}

/// open されたリンクの記録
#[derive(Debug, Clone)]
pub struct OpenedLink {
    pub request: OpenRequest,
    pub sink: TransportSink,
    pub calls: Vec<LinkCall>,
    pub closed: bool,
}

#[derive(Debug, Default)]
pub struct TransportLog {
    pub links: Vec<OpenedLink>,
    pub failed_opens: usize,
}

impl TransportLog {
    /// close されていないリンクの数
    pub fn live_links(&self) -> usize {
        self.links.iter().filter(|link| !link.closed).count()
    }

    /// 全リンクに対する操作（リンクごと）
    pub fn all_calls(&self) -> Vec<(usize, LinkCall)> {
        self.links
            .iter()
            .enumerate()
            .flat_map(|(index, link)| link.calls.iter().cloned().map(move |call| (index, call)))
            .collect()
    }
}

#[derive(Default)]
struct Shared {
    log: Mutex<TransportLog>,
    sequence: Mutex<Vec<(usize, LinkCall)>>,
    fail_open: AtomicBool,
}

/// 呼び出しを記録するフェイク Transport
#[derive(Clone, Default)]
pub struct FakeTransport {
    shared: Arc<Shared>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, TransportLog> {
        self.shared.log.lock().unwrap()
    }

    /// 全リンクに対する操作（発生順）
    pub fn sequence(&self) -> Vec<(usize, LinkCall)> {
        self.shared.sequence.lock().unwrap().clone()
    }

    /// 以降の open を失敗させる
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// n 番目に open されたリンクの sink
    pub fn sink(&self, index: usize) -> TransportSink {
        self.log().links[index].sink.clone()
    }

    /// 最後に open されたリンクの sink
    pub fn last_sink(&self) -> TransportSink {
        let log = self.log();
        log.links.last().unwrap().sink.clone()
    }

    pub fn open_count(&self) -> usize {
        self.log().links.len()
    }

    pub fn live_links(&self) -> usize {
        self.log().live_links()
    }

    /// n 番目のリンクで publish されたフレーム
    pub fn published(&self, index: usize) -> Vec<(Channel, String)> {
        self.log().links[index]
            .calls
            .iter()
            .filter_map(|call| match call {
                LinkCall::Publish(channel, payload) => Some((*channel, payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// 全リンクで publish された回数
    pub fn publish_count(&self) -> usize {
        self.log()
            .all_calls()
            .iter()
            .filter(|(_, call)| matches!(call, LinkCall::Publish(..)))
            .count()
    }

    fn record(&self, index: usize, call: LinkCall) {
        {
            let mut log = self.log();
            let link = &mut log.links[index];
            if call == LinkCall::Close {
                if link.closed {
                    return;
                }
                link.closed = true;
            }
            link.calls.push(call.clone());
        }
        self.shared.sequence.lock().unwrap().push((index, call));
    }
}

impl Transport for FakeTransport {
    fn open(
        &self,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<Box<dyn TransportLink>, TransportError> {
        let mut log = self.log();
        if self.shared.fail_open.load(Ordering::SeqCst) {
            log.failed_opens += 1;
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        let index = log.links.len();
        log.links.push(OpenedLink {
            request,
            sink,
            calls: Vec::new(),
            closed: false,
        });
        Ok(Box::new(FakeLink {
            index,
            transport: self.clone(),
        }))
    }
}

struct FakeLink {
    index: usize,
    transport: FakeTransport,
}

impl TransportLink for FakeLink {
    fn authenticate(&mut self, token: &str) -> Result<(), TransportError> {
        self.transport
            .record(self.index, LinkCall::Authenticate(token.to_string()));
        Ok(())
    }

    fn subscribe(
        &mut self,
        room_id: &RoomId,
        channel: Channel,
    ) -> Result<SubscriptionRef, TransportError> {
        let subscription = SubscriptionRef::new(format!("{}:{room_id}:{channel}", self.index));
        self.transport
            .record(self.index, LinkCall::Subscribe(subscription.clone()));
        Ok(subscription)
    }

    fn unsubscribe(&mut self, subscription: &SubscriptionRef) {
        self.transport
            .record(self.index, LinkCall::Unsubscribe(subscription.clone()));
    }

    fn publish(
        &mut self,
        _room_id: &RoomId,
        channel: Channel,
        payload: String,
    ) -> Result<(), TransportError> {
        self.transport
            .record(self.index, LinkCall::Publish(channel, payload));
        Ok(())
    }

    fn close(&mut self) {
        self.transport.record(self.index, LinkCall::Close);
    }
}

/// スケジュールされたタスクの記録
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub delay: Duration,
    pub event: ManagerEvent,
    pub cancelled: Arc<AtomicBool>,
}

/// 時間を進めずに記録だけ行うフェイク Scheduler
#[derive(Clone, Default)]
pub struct FakeScheduler {
    tasks: Arc<Mutex<Vec<ScheduledTask>>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().unwrap().clone()
    }

    /// スケジュールされた遅延（ミリ秒）
    pub fn delays_ms(&self) -> Vec<u128> {
        self.tasks()
            .iter()
            .map(|task| task.delay.as_millis())
            .collect()
    }

    /// キャンセルされていないタスクの数
    pub fn pending(&self) -> usize {
        self.tasks()
            .iter()
            .filter(|task| !task.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn last(&self) -> ScheduledTask {
        self.tasks().last().cloned().unwrap()
    }
}

impl Scheduler for FakeScheduler {
    fn schedule(
        &self,
        delay: Duration,
        event: ManagerEvent,
        _events: &EventSender,
    ) -> Box<dyn DeferredTask> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().unwrap().push(ScheduledTask {
            delay,
            event,
            cancelled: cancelled.clone(),
        });
        Box::new(FakeDeferredTask { cancelled })
    }
}

struct FakeDeferredTask {
    cancelled: Arc<AtomicBool>,
}

impl DeferredTask for FakeDeferredTask {
    fn cancel(self: Box<Self>) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

pub fn user(id: &str, username: &str) -> UserIdentity {
    UserIdentity::new(UserId::try_from(id).unwrap(), username)
}

pub fn room(id: &str) -> RoomId {
    RoomId::try_from(id).unwrap()
}

/// CHAT フレームの JSON
pub fn chat_json(room_id: &str, sender_id: &str, message: &str) -> String {
    serde_json::json!({
        "chatRoomId": room_id,
        "senderId": sender_id,
        "senderUsername": format!("name-{sender_id}"),
        "message": message,
        "createdAt": "2026-03-01T10:00:00Z",
        "type": "CHAT",
    })
    .to_string()
}

/// JOIN / LEAVE / TYPING フレームの JSON
pub fn activity_json(frame_type: &str, room_id: &str, sender_id: &str) -> String {
    serde_json::json!({
        "chatRoomId": room_id,
        "senderId": sender_id,
        "senderUsername": format!("name-{sender_id}"),
        "message": "",
        "createdAt": "2026-03-01T10:00:00Z",
        "type": frame_type,
    })
    .to_string()
}

/// 接続マネージャをフェイクで駆動するハーネス
pub struct Harness {
    pub manager: ConnectionManager,
    pub transport: FakeTransport,
    pub scheduler: FakeScheduler,
    pub events: mpsc::UnboundedReceiver<ManagerEvent>,
}

impl Harness {
    /// 任意のコラボレータで作成
    pub fn new(session: Arc<dyn SessionStore>, store: Arc<dyn RoomMessageStore>) -> Self {
        let config = RealtimeConfig::default();
        let transport = FakeTransport::new();
        let scheduler = FakeScheduler::new();
        let (events_tx, events) = EventSender::channel();
        let manager = ConnectionManager::new(
            config,
            session,
            store,
            Arc::new(transport.clone()),
            Arc::new(scheduler.clone()),
            events_tx,
        );
        Self {
            manager,
            transport,
            scheduler,
            events,
        }
    }

    /// u1 (alice) でサインイン済み、インメモリストアで作成
    pub fn signed_in() -> (
        Self,
        Arc<InMemorySessionStore>,
        Arc<InMemoryRoomMessageStore>,
    ) {
        let session = Arc::new(InMemorySessionStore::signed_in(
            "jwt-u1",
            user("u1", "alice"),
        ));
        let store = Arc::new(InMemoryRoomMessageStore::new());
        let harness = Self::new(session.clone(), store.clone());
        (harness, session, store)
    }

    /// キューに溜まったイベントを全てマネージャに渡す
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.manager.handle_event(event).await;
        }
    }

    /// 最後に open されたリンクのハンドシェイクを完了させる
    pub async fn complete_handshake(&mut self) {
        let sink = self.transport.last_sink();
        sink.opened();
        self.pump().await;
        sink.ready();
        self.pump().await;
    }

    /// ルームに接続し Connected まで進める
    pub async fn connect_room(&mut self, room_id: &str) {
        self.manager.connect(room(room_id)).unwrap();
        self.complete_handshake().await;
    }

    /// 最後に open されたリンクにフレームを届ける
    pub async fn deliver(&mut self, payload: &str) {
        self.transport.last_sink().message(payload);
        self.pump().await;
    }

    /// 最後に open されたリンクを相手側から切断する
    pub async fn drop_transport(&mut self) {
        self.transport.last_sink().closed("connection reset");
        self.pump().await;
    }

    /// 最後にスケジュールされた再接続タイマーを発火させる
    pub async fn fire_reconnect(&mut self) {
        let task = self.scheduler.last();
        self.manager.handle_event(task.event).await;
    }
}
