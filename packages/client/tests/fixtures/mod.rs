//! Test fixtures for realtime integration tests.
//!
//! `TestBackend` is an in-process axum WebSocket server speaking both
//! bindings:
//!
//! - `/ws/chat/{room_id}`: raw socket. Expects an AUTH frame first.
//! - `/ws`: STOMP 1.2.
//!
//! Once a client is authenticated (raw) or subscribed to the chat topic
//! (STOMP), the backend greets it with a CHAT frame from the client's own
//! user `u1`, a CHAT frame from `u2`, and a JOIN of `u3` as a marker. Every
//! CHAT frame the client publishes is echoed back, followed by a TYPING frame
//! from `server` as a marker.
//!
//! The raw route can also reject every AUTH frame by closing the socket, or
//! stay quiet after authentication.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use kasper_client::{
    domain::{UserId, UserIdentity},
    infrastructure::{
        repository::{InMemoryRoomMessageStore, InMemorySessionStore},
        transport::stomp::{StompCommand, StompFrame},
    },
    realtime::{
        BackoffPolicy, RealtimeClient, RealtimeConfig, RealtimeHandle, RoomActivity,
        TransportBinding,
    },
};
use tokio::{sync::broadcast, task::JoinHandle, time::timeout};

/// How long a test waits for an expected event
pub const WAIT: Duration = Duration::from_secs(5);

/// Frames the client published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// STOMP destination (None for the raw binding)
    pub destination: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct BackendState {
    connections: AtomicUsize,
    drop_first: AtomicBool,
    reject_auth: AtomicBool,
    quiet: AtomicBool,
    auth: Mutex<Vec<String>>,
    subscriptions: Mutex<Vec<String>>,
    unsubscribed: Mutex<Vec<String>>,
    published: Mutex<Vec<Published>>,
    disconnects: AtomicUsize,
}

/// In-process chat backend
pub struct TestBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    task: JoinHandle<()>,
}

impl TestBackend {
    /// Start on an ephemeral port
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/ws", get(stomp_handler))
            .route("/ws/chat/{room_id}", get(raw_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test backend");
        let addr = listener.local_addr().expect("Failed to read local address");
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Test backend failed");
        });
        Self { addr, state, task }
    }

    /// Close the first connection right after authentication
    pub fn drop_first_connection(&self) {
        self.state.drop_first.store(true, Ordering::SeqCst);
    }

    /// Close every raw connection right after reading its AUTH frame
    pub fn reject_auth(&self) {
        self.state.reject_auth.store(true, Ordering::SeqCst);
    }

    /// Send nothing to authenticated raw clients until they publish
    pub fn quiet(&self) {
        self.state.quiet.store(true, Ordering::SeqCst);
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Raw AUTH frames, or STOMP `Authorization` headers
    pub fn auth(&self) -> Vec<String> {
        self.state.auth.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().unwrap().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.state.unsubscribed.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.published.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Spawn a client signed in as `u1` (alice)
    pub fn spawn_client(
        &self,
        binding: TransportBinding,
        token: Option<&str>,
    ) -> (RealtimeHandle, Arc<InMemoryRoomMessageStore>) {
        let user = UserIdentity::new(UserId::try_from("u1").unwrap(), "alice");
        let session = Arc::new(match token {
            Some(token) => InMemorySessionStore::signed_in(token, user),
            None => InMemorySessionStore::default(),
        });
        let store = Arc::new(InMemoryRoomMessageStore::new());
        let config = RealtimeConfig {
            endpoint: self.endpoint(),
            binding,
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                ..BackoffPolicy::default()
            },
            ..RealtimeConfig::default()
        };
        let client = RealtimeClient::spawn(config, session, store.clone());
        (client, store)
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Wait for the first activity matching `predicate`
pub async fn wait_for_activity(
    activity: &mut broadcast::Receiver<RoomActivity>,
    predicate: impl Fn(&RoomActivity) -> bool,
) -> RoomActivity {
    timeout(WAIT, async {
        loop {
            match activity.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(error) => panic!("activity channel failed: {error}"),
            }
        }
    })
    .await
    .expect("Timed out waiting for room activity")
}

/// Poll until `check` holds
pub async fn eventually(check: impl Fn() -> bool) {
    timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for condition");
}

pub fn is_join_of(user_id: &'static str) -> impl Fn(&RoomActivity) -> bool {
    move |event| matches!(event, RoomActivity::Joined { user, .. } if user.id.as_str() == user_id)
}

pub fn is_typing_of(user_id: &'static str) -> impl Fn(&RoomActivity) -> bool {
    move |event| matches!(event, RoomActivity::Typing { user, .. } if user.id.as_str() == user_id)
}

fn wire_frame(frame_type: &str, room_id: &str, sender_id: &str, message: &str) -> String {
    serde_json::json!({
        "chatRoomId": room_id,
        "senderId": sender_id,
        "senderUsername": format!("name-{sender_id}"),
        "message": message,
        "createdAt": "2026-03-01T10:00:00",
        "type": frame_type,
    })
    .to_string()
}

fn greeting(room_id: &str) -> Vec<String> {
    vec![
        wire_frame("CHAT", room_id, "u1", "echo of an earlier message"),
        wire_frame("CHAT", room_id, "u2", "hello from u2"),
        wire_frame("JOIN", room_id, "u3", ""),
    ]
}

async fn next_text(socket: &mut WebSocket) -> Option<String> {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => return Some(text.as_str().to_string()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    socket.send(Message::Text(text.into())).await.is_ok()
}

// ========================================
// Raw socket binding
// ========================================

async fn raw_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<Arc<BackendState>>,
) -> Response {
    ws.on_upgrade(move |socket| raw_session(socket, room_id, state))
}

async fn raw_session(mut socket: WebSocket, room_id: String, state: Arc<BackendState>) {
    let index = state.connections.fetch_add(1, Ordering::SeqCst);

    let Some(auth) = next_text(&mut socket).await else {
        return;
    };
    state.auth.lock().unwrap().push(auth);

    let rejected = state.reject_auth.load(Ordering::SeqCst);
    if rejected || (index == 0 && state.drop_first.load(Ordering::SeqCst)) {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    if !state.quiet.load(Ordering::SeqCst) {
        for frame in greeting(&room_id) {
            if !send_text(&mut socket, frame).await {
                return;
            }
        }
    }

    while let Some(text) = next_text(&mut socket).await {
        state.published.lock().unwrap().push(Published {
            destination: None,
            body: text.clone(),
        });
        if is_chat(&text) {
            let marker = wire_frame("TYPING", &room_id, "server", "");
            if !send_text(&mut socket, text).await || !send_text(&mut socket, marker).await {
                return;
            }
        }
    }
}

fn is_chat(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .map(|value| value["type"] == "CHAT")
        .unwrap_or(false)
}

// ========================================
// STOMP binding
// ========================================

async fn stomp_handler(ws: WebSocketUpgrade, State(state): State<Arc<BackendState>>) -> Response {
    ws.on_upgrade(move |socket| stomp_session(socket, state))
}

async fn stomp_session(mut socket: WebSocket, state: Arc<BackendState>) {
    let index = state.connections.fetch_add(1, Ordering::SeqCst);
    // destination -> subscription id
    let mut subscriptions: Vec<(String, String)> = Vec::new();
    let mut message_id = 0u64;

    while let Some(text) = next_text(&mut socket).await {
        let Ok(Some(frame)) = StompFrame::decode(&text) else {
            continue;
        };
        match frame.command {
            StompCommand::Connect => {
                let authorization = frame.get("Authorization").unwrap_or_default().to_string();
                state.auth.lock().unwrap().push(authorization);
                if index == 0 && state.drop_first.load(Ordering::SeqCst) {
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
                let connected = StompFrame::new(StompCommand::Connected).header("version", "1.2");
                if !send_text(&mut socket, connected.encode()).await {
                    return;
                }
            }
            StompCommand::Subscribe => {
                let id = frame.get("id").unwrap_or_default().to_string();
                let destination = frame.get("destination").unwrap_or_default().to_string();
                state.subscriptions.lock().unwrap().push(destination.clone());
                subscriptions.push((destination.clone(), id));

                if let Some(room_id) = destination
                    .strip_prefix("/topic/chat/")
                    .filter(|rest| !rest.contains('/'))
                {
                    for body in greeting(room_id) {
                        message_id += 1;
                        let message = message_frame(&subscriptions, &destination, message_id, body);
                        if !send_text(&mut socket, message).await {
                            return;
                        }
                    }
                }
            }
            StompCommand::Unsubscribe => {
                let id = frame.get("id").unwrap_or_default().to_string();
                state.unsubscribed.lock().unwrap().push(id);
            }
            StompCommand::Send => {
                let destination = frame.get("destination").unwrap_or_default().to_string();
                state.published.lock().unwrap().push(Published {
                    destination: Some(destination.clone()),
                    body: frame.body.clone(),
                });
                let Some(room_id) = destination.strip_prefix("/app/chat/") else {
                    continue;
                };
                if room_id.contains('/') || !is_chat(&frame.body) {
                    continue;
                }
                let chat_topic = format!("/topic/chat/{room_id}");
                let typing_topic = format!("/topic/chat/{room_id}/typing");
                let marker = wire_frame("TYPING", room_id, "server", "");
                message_id += 1;
                let echo = message_frame(&subscriptions, &chat_topic, message_id, frame.body);
                message_id += 1;
                let marker = message_frame(&subscriptions, &typing_topic, message_id, marker);
                if !send_text(&mut socket, echo).await || !send_text(&mut socket, marker).await {
                    return;
                }
            }
            StompCommand::Disconnect => {
                state.disconnects.fetch_add(1, Ordering::SeqCst);
                return;
            }
            _ => {}
        }
    }
}

fn message_frame(
    subscriptions: &[(String, String)],
    destination: &str,
    message_id: u64,
    body: String,
) -> String {
    let subscription = subscriptions
        .iter()
        .find(|(subscribed, _)| subscribed == destination)
        .map(|(_, id)| id.clone())
        .unwrap_or_default();
    StompFrame::new(StompCommand::Message)
        .header("destination", destination)
        .header("subscription", subscription)
        .header("message-id", message_id.to_string())
        .header("content-type", "application/json")
        .body(body)
        .encode()
}
