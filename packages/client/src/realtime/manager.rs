//! Realtime connection manager.
//!
//! Owns at most one transport link and at most one reconnect timer at a time
//! and drives the connect / authenticate / subscribe handshake:
//!
//! ```text
//!            connect()            opened               ready
//!   Idle ─────────────▶ Opening ─────────▶ Authenticating ─────▶ Connected
//!    ▲                     │                    │                   │
//!    │ close()             └──── lost ──────────┴────── lost ───────┘
//!    │                                          │
//!    │                                          ▼
//!    └──────────────────────────────────── Backoff ── timer ──▶ Opening
//!                                               │
//!                                   ceiling ──▶ Failed
//! ```
//!
//! The manager is synchronous apart from the store writes and is only ever
//! entered from one task. Transport callbacks and timer firings arrive as
//! [`ManagerEvent`]s tagged with the generation they were issued under; any
//! event whose generation is not the current one belongs to a superseded
//! link (or cancelled timer) and is ignored.

use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

use super::{
    backoff::ReconnectState,
    config::RealtimeConfig,
    error::{ConnectError, ReconnectExhausted, SendError, TransportError},
    event::{EventSender, ManagerEvent, RoomActivity, TransportEvent},
    normalize,
    scheduler::{DeferredTask, Scheduler},
    state::ConnectionState,
    transport::{Channel, OpenRequest, SubscriptionRef, Transport, TransportLink, TransportSink},
};
use crate::{
    domain::{
        DomainMessage, MessageIdFactory, RoomId, RoomMessageStore, SessionStore, Timestamp,
        UserIdentity,
    },
    infrastructure::dto::websocket::{FrameType, WireFrame},
};

/// Subscriptions held for the current room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSubscription {
    /// Subscribed room
    pub room_id: RoomId,
    /// Handles issued by the link, one per channel
    pub channel_refs: BTreeSet<SubscriptionRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Opening,
    Authenticating,
    Connected,
    Backoff,
    Failed,
}

struct PendingReconnect {
    generation: u64,
    task: Box<dyn DeferredTask>,
}

/// Realtime connection manager
pub struct ConnectionManager {
    config: RealtimeConfig,
    session: Arc<dyn SessionStore>,
    store: Arc<dyn RoomMessageStore>,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    events: EventSender,
    state_tx: watch::Sender<ConnectionState>,
    activity_tx: broadcast::Sender<RoomActivity>,
    phase: Phase,
    generation: u64,
    link: Option<Box<dyn TransportLink>>,
    room_id: Option<RoomId>,
    subscription: Option<RoomSubscription>,
    reconnect: ReconnectState,
    pending: Option<PendingReconnect>,
    failure: Option<ReconnectExhausted>,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state
    ///
    /// Transport callbacks and timer firings are delivered through `events`;
    /// the owner must feed the receiving half back into [`Self::handle_event`].
    pub fn new(
        config: RealtimeConfig,
        session: Arc<dyn SessionStore>,
        store: Arc<dyn RoomMessageStore>,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        events: EventSender,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (activity_tx, _) = broadcast::channel(config.activity_capacity.max(1));
        let reconnect = ReconnectState::new(config.backoff);
        Self {
            config,
            session,
            store,
            transport,
            scheduler,
            events,
            state_tx,
            activity_tx,
            phase: Phase::Idle,
            generation: 0,
            link: None,
            room_id: None,
            subscription: None,
            reconnect,
            pending: None,
            failure: None,
        }
    }

    /// Connect to a room.
    ///
    /// Tears down any existing link or pending reconnect first and resets the
    /// attempt counter. Returns as soon as the link is being opened; progress
    /// is observed through [`Self::subscribe_state`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectError::AuthMissing` if the session has no token. No
    /// transport is opened and the attempt is not retried.
    pub fn connect(&mut self, room_id: RoomId) -> Result<(), ConnectError> {
        info!(room_id = %room_id, "Connecting to chat room");
        self.reconnect.reset();
        self.failure = None;
        self.start_cycle(room_id)
    }

    /// Close the connection.
    ///
    /// Cancels any pending reconnect, unsubscribes and closes the link, and
    /// forgets the room. Safe to call repeatedly and from any state.
    pub fn close(&mut self) {
        let was_active = self.phase != Phase::Idle || self.link.is_some() || self.pending.is_some();
        self.teardown();
        self.room_id = None;
        self.reconnect.reset();
        self.failure = None;
        self.set_phase(Phase::Idle);
        if was_active {
            info!("Realtime connection closed");
        }
    }

    /// Publish a chat message to the current room.
    ///
    /// The message is not acknowledged by the backend. Once published it is
    /// appended to the room log locally and returned; the backend's echo of it
    /// is dropped on arrival.
    ///
    /// # Errors
    ///
    /// Returns `SendError::NotConnected` (without touching the transport)
    /// unless the manager is connected with a known room and user.
    pub async fn send_message(
        &mut self,
        text: &str,
        file_url: Option<String>,
    ) -> Result<DomainMessage, SendError> {
        let Some((room_id, user)) = self.connected_identity() else {
            warn!(state = %self.state(), "Cannot send message: not connected");
            return Err(SendError::NotConnected);
        };

        let created_at = Timestamp::now();
        let frame = normalize::outbound_frame(
            FrameType::Chat,
            &room_id,
            &user,
            text,
            file_url.clone(),
            created_at,
        );
        let payload = serde_json::to_string(&frame)?;
        let link = self.link.as_mut().ok_or(SendError::NotConnected)?;
        link.publish(&room_id, Channel::Chat, payload)?;

        let message = DomainMessage {
            id: MessageIdFactory::generate(),
            chat_room_id: room_id,
            sender: user.into(),
            message: text.to_string(),
            file_url,
            created_at,
            encrypted: false,
        };
        debug!(message_id = %message.id, room_id = %message.chat_room_id, "Message sent");
        if let Err(error) = self.store.add_message(message.clone()).await {
            warn!(%error, "Room log rejected sent message");
        }
        Ok(message)
    }

    /// Publish a typing notification. Does nothing unless connected.
    pub fn send_typing_status(&mut self) {
        let Some((room_id, user)) = self.connected_identity() else {
            trace!("Typing status skipped: not connected");
            return;
        };
        let frame = normalize::outbound_frame(
            FrameType::Typing,
            &room_id,
            &user,
            "",
            None,
            Timestamp::now(),
        );
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, "Typing status not encoded");
                return;
            }
        };
        if let Some(link) = self.link.as_mut()
            && let Err(error) = link.publish(&room_id, Channel::Typing, payload)
        {
            debug!(%error, "Typing status not delivered");
        }
    }

    /// Handle one transport callback or timer firing
    pub async fn handle_event(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::Transport { generation, event } => {
                if generation != self.generation {
                    trace!(
                        generation,
                        current = self.generation,
                        "Ignoring event from superseded transport"
                    );
                    return;
                }
                self.on_transport_event(event).await;
            }
            ManagerEvent::ReconnectDue { generation } => self.on_reconnect_due(generation),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Idle => ConnectionState::Disconnected,
            Phase::Opening | Phase::Authenticating if self.reconnect.attempts() > 0 => {
                ConnectionState::Reconnecting
            }
            Phase::Opening | Phase::Authenticating => ConnectionState::Connecting,
            Phase::Connected => ConnectionState::Connected,
            Phase::Backoff => ConnectionState::Reconnecting,
            Phase::Failed => ConnectionState::Failed,
        }
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to presence and typing signals
    pub fn subscribe_activity(&self) -> broadcast::Receiver<RoomActivity> {
        self.activity_tx.subscribe()
    }

    /// Sender side of the activity channel
    pub fn activity_sender(&self) -> broadcast::Sender<RoomActivity> {
        self.activity_tx.clone()
    }

    /// Room of the current (or retried) connection
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Reconnect attempts since the last successful connection
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect.attempts()
    }

    /// Active subscriptions
    pub fn subscription(&self) -> Option<&RoomSubscription> {
        self.subscription.as_ref()
    }

    /// Whether a transport link is held
    pub fn has_live_transport(&self) -> bool {
        self.link.is_some()
    }

    /// Whether a reconnect timer is pending
    pub fn has_pending_reconnect(&self) -> bool {
        self.pending.is_some()
    }

    /// Why the manager gave up, while in `Failed`
    pub fn failure(&self) -> Option<ReconnectExhausted> {
        self.failure
    }

    fn start_cycle(&mut self, room_id: RoomId) -> Result<(), ConnectError> {
        self.teardown();

        if !self.session.current().is_authenticated() {
            warn!(room_id = %room_id, "No authentication token in session; not connecting");
            self.room_id = None;
            self.reconnect.reset();
            self.set_phase(Phase::Idle);
            return Err(ConnectError::AuthMissing);
        }

        self.room_id = Some(room_id.clone());
        self.set_phase(Phase::Opening);

        let request = OpenRequest {
            endpoint: self.config.endpoint.clone(),
            room_id,
        };
        let sink = TransportSink::new(self.generation, self.events.clone());
        match self.transport.open(request, sink) {
            Ok(link) => {
                debug!(generation = self.generation, "Transport opening");
                self.link = Some(link);
            }
            Err(error) => {
                warn!(%error, "Failed to open transport");
                self.schedule_reconnect();
            }
        }
        Ok(())
    }

    /// Cancel the timer, drop subscriptions and close the link.
    ///
    /// Bumps the generation so callbacks from the closed link are ignored.
    fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(generation = pending.generation, "Cancelling pending reconnect");
            pending.task.cancel();
        }

        let subscription = self.subscription.take();
        if let Some(mut link) = self.link.take() {
            if let Some(subscription) = subscription {
                for channel_ref in &subscription.channel_refs {
                    link.unsubscribe(channel_ref);
                }
                debug!(room_id = %subscription.room_id, "Unsubscribed");
            }
            link.close();
            debug!(generation = self.generation, "Transport closed");
        }

        self.generation += 1;
    }

    fn schedule_reconnect(&mut self) {
        let Some(delay) = self.reconnect.next_delay() else {
            let exhausted = ReconnectExhausted {
                attempts: self.reconnect.attempts(),
            };
            error!(%exhausted, "Giving up on realtime connection");
            self.failure = Some(exhausted);
            self.set_phase(Phase::Failed);
            return;
        };

        let generation = self.generation;
        info!(
            attempt = self.reconnect.attempts(),
            ceiling = self.reconnect.ceiling(),
            delay = ?delay,
            "Scheduling reconnect"
        );
        let task = self.scheduler.schedule(
            delay,
            ManagerEvent::ReconnectDue { generation },
            &self.events,
        );
        self.pending = Some(PendingReconnect { generation, task });
        self.set_phase(Phase::Backoff);
    }

    fn on_reconnect_due(&mut self, generation: u64) {
        match &self.pending {
            Some(pending) if pending.generation == generation => {}
            _ => {
                trace!(generation, "Ignoring stale reconnect timer");
                return;
            }
        }
        self.pending = None;

        let Some(room_id) = self.room_id.clone() else {
            self.set_phase(Phase::Idle);
            return;
        };
        info!(
            attempt = self.reconnect.attempts(),
            room_id = %room_id,
            "Reconnecting"
        );
        if let Err(error) = self.start_cycle(room_id) {
            warn!(%error, "Reconnect abandoned");
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Ready => self.on_ready(),
            TransportEvent::Message(payload) => self.on_frame(&payload).await,
            TransportEvent::Closed { reason } => {
                self.on_transport_lost(TransportError::Closed(reason));
            }
            TransportEvent::Failed(error) => self.on_transport_lost(error),
        }
    }

    fn on_opened(&mut self) {
        if self.phase != Phase::Opening {
            debug!(phase = ?self.phase, "Ignoring unexpected transport open");
            return;
        }
        let Some(token) = self.session.current().token else {
            warn!("Session token disappeared during handshake");
            self.close();
            return;
        };

        self.set_phase(Phase::Authenticating);
        let result = match self.link.as_mut() {
            Some(link) => link.authenticate(&token),
            None => return,
        };
        if let Err(error) = result {
            self.on_transport_lost(error);
        }
    }

    fn on_ready(&mut self) {
        if self.phase != Phase::Authenticating {
            debug!(phase = ?self.phase, "Ignoring unexpected transport ready");
            return;
        }
        let (Some(link), Some(room_id)) = (self.link.as_mut(), self.room_id.clone()) else {
            return;
        };

        let subscribed: Result<BTreeSet<_>, TransportError> = [Channel::Chat, Channel::Typing]
            .into_iter()
            .map(|channel| link.subscribe(&room_id, channel))
            .collect();
        match subscribed {
            Ok(channel_refs) => {
                self.subscription = Some(RoomSubscription {
                    room_id: room_id.clone(),
                    channel_refs,
                });
                self.reconnect.reset();
                self.set_phase(Phase::Connected);
                info!(room_id = %room_id, "Subscribed to chat room");
            }
            Err(error) => self.on_transport_lost(error),
        }
    }

    fn on_transport_lost(&mut self, error: TransportError) {
        if matches!(self.phase, Phase::Idle | Phase::Backoff | Phase::Failed) {
            debug!(%error, phase = ?self.phase, "Ignoring transport loss");
            return;
        }
        warn!(%error, room_id = ?self.room_id, "Realtime transport lost");
        self.teardown();
        self.schedule_reconnect();
    }

    async fn on_frame(&mut self, payload: &str) {
        let frame = match normalize::decode_frame(payload) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "Dropping malformed frame");
                return;
            }
        };
        match frame.r#type {
            FrameType::Chat => self.on_chat(frame).await,
            FrameType::Join | FrameType::Leave | FrameType::Typing => self.on_activity(frame),
            FrameType::Auth => debug!("Ignoring inbound AUTH frame"),
        }
    }

    async fn on_chat(&mut self, frame: WireFrame) {
        if self.is_self_echo(&frame) {
            debug!(sender_id = %frame.sender_id, "Dropping echo of own message");
            return;
        }
        let message = match normalize::to_domain_message(frame) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "Dropping malformed chat frame");
                return;
            }
        };
        debug!(
            message_id = %message.id,
            room_id = %message.chat_room_id,
            sender_id = %message.sender.id,
            "Message received"
        );
        if let Err(error) = self.store.add_message(message).await {
            warn!(%error, "Room log rejected received message");
        }
    }

    fn on_activity(&self, frame: WireFrame) {
        let activity = match normalize::to_activity(frame) {
            Ok(activity) => activity,
            Err(error) => {
                warn!(%error, "Dropping malformed activity frame");
                return;
            }
        };
        match &activity {
            RoomActivity::Joined { room_id, user } => {
                info!(room_id = %room_id, username = %user.username, "User joined");
            }
            RoomActivity::Left { room_id, user } => {
                info!(room_id = %room_id, username = %user.username, "User left");
            }
            RoomActivity::Typing { room_id, user, .. } => {
                debug!(room_id = %room_id, username = %user.username, "User typing");
            }
        }
        // No receivers is not an error
        let _ = self.activity_tx.send(activity);
    }

    fn is_self_echo(&self, frame: &WireFrame) -> bool {
        self.session
            .current()
            .user
            .is_some_and(|user| user.id.as_str() == frame.sender_id)
    }

    fn connected_identity(&self) -> Option<(RoomId, UserIdentity)> {
        if self.phase != Phase::Connected {
            return None;
        }
        let room_id = self.room_id.clone()?;
        let user = self.session.current().user?;
        Some((room_id, user))
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        let state = self.state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            info!(%state, "Connection state changed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
