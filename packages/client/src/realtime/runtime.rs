//! Actor runtime owning the connection manager.
//!
//! One tokio task owns the [`ConnectionManager`] and multiplexes caller
//! commands, transport callbacks, reconnect timers and session changes with
//! `tokio::select!`, so the manager is never entered concurrently. Callers
//! talk to it through a cloneable [`RealtimeHandle`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info};

use super::{
    config::RealtimeConfig,
    error::{ConnectError, ReconnectExhausted, SendError},
    event::{EventSender, ManagerEvent, RoomActivity},
    manager::ConnectionManager,
    scheduler::{Scheduler, TokioScheduler},
    state::ConnectionState,
    transport::Transport,
};
use crate::{
    domain::{DomainMessage, RoomId, RoomMessageStore, Session, SessionStore},
    infrastructure::transport,
};

const COMMAND_BUFFER: usize = 32;

enum Command {
    Connect {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
    SendMessage {
        text: String,
        file_url: Option<String>,
        reply: oneshot::Sender<Result<DomainMessage, SendError>>,
    },
    SendTyping,
    Close {
        reply: oneshot::Sender<()>,
    },
    Failure {
        reply: oneshot::Sender<Option<ReconnectExhausted>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Entry point for starting a realtime session
pub struct RealtimeClient;

impl RealtimeClient {
    /// Spawn the actor using the transport binding named in `config`
    pub fn spawn(
        config: RealtimeConfig,
        session: Arc<dyn SessionStore>,
        store: Arc<dyn RoomMessageStore>,
    ) -> RealtimeHandle {
        let transport = transport::for_binding(config.binding);
        Self::spawn_with(config, session, store, transport, Arc::new(TokioScheduler))
    }

    /// Spawn the actor with an explicit transport and scheduler
    pub fn spawn_with(
        config: RealtimeConfig,
        session: Arc<dyn SessionStore>,
        store: Arc<dyn RoomMessageStore>,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> RealtimeHandle {
        let (events_tx, events_rx) = EventSender::channel();
        let session_rx = session.subscribe();
        let manager =
            ConnectionManager::new(config, session, store, transport, scheduler, events_tx);
        let state = manager.subscribe_state();
        let activity = manager.activity_sender();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        tokio::spawn(run(manager, commands_rx, events_rx, session_rx));

        RealtimeHandle {
            commands: commands_tx,
            state,
            activity,
        }
    }
}

/// Handle to a running realtime session
#[derive(Clone)]
pub struct RealtimeHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    activity: broadcast::Sender<RoomActivity>,
}

impl RealtimeHandle {
    /// Connect to a room. Returns once the link is being opened.
    ///
    /// # Errors
    ///
    /// `ConnectError::AuthMissing` if the session has no token,
    /// `ConnectError::ClientStopped` if the actor is gone.
    pub async fn connect(&self, room_id: RoomId) -> Result<(), ConnectError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { room_id, reply })
            .await
            .map_err(|_| ConnectError::ClientStopped)?;
        rx.await.map_err(|_| ConnectError::ClientStopped)?
    }

    /// Send a chat message to the connected room
    ///
    /// # Errors
    ///
    /// `SendError::NotConnected` unless connected; see [`ConnectionManager::send_message`].
    pub async fn send_message(
        &self,
        text: impl Into<String>,
        file_url: Option<String>,
    ) -> Result<DomainMessage, SendError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SendMessage {
                text: text.into(),
                file_url,
                reply,
            })
            .await
            .map_err(|_| SendError::ClientStopped)?;
        rx.await.map_err(|_| SendError::ClientStopped)?
    }

    /// Send a typing notification (best-effort)
    pub async fn send_typing_status(&self) {
        let _ = self.commands.send(Command::SendTyping).await;
    }

    /// Close the connection. The actor keeps running.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Why automatic reconnection gave up, if it did
    pub async fn failure(&self) -> Option<ReconnectExhausted> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Failure { reply }).await.ok()?;
        rx.await.ok().flatten()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribe to presence and typing signals
    pub fn activity(&self) -> broadcast::Receiver<RoomActivity> {
        self.activity.subscribe()
    }

    /// Close the connection and stop the actor
    pub async fn shutdown(self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run(
    mut manager: ConnectionManager,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::UnboundedReceiver<ManagerEvent>,
    mut session: watch::Receiver<Session>,
) {
    debug!("Realtime actor started");
    let mut session_open = true;

    loop {
        // Transport events already delivered are handled before the next command
        tokio::select! {
            biased;
            Some(event) = events.recv() => manager.handle_event(event).await,
            command = commands.recv() => match command {
                Some(Command::Shutdown { reply }) => {
                    manager.close();
                    let _ = reply.send(());
                    break;
                }
                Some(command) => handle_command(&mut manager, command).await,
                None => {
                    manager.close();
                    break;
                }
            },
            changed = session.changed(), if session_open => match changed {
                Ok(()) => {
                    let authenticated = session.borrow_and_update().is_authenticated();
                    if !authenticated {
                        info!("Session ended; closing realtime connection");
                        manager.close();
                    }
                }
                Err(_) => session_open = false,
            },
        }
    }

    debug!("Realtime actor stopped");
}

async fn handle_command(manager: &mut ConnectionManager, command: Command) {
    match command {
        Command::Connect { room_id, reply } => {
            let _ = reply.send(manager.connect(room_id));
        }
        Command::SendMessage {
            text,
            file_url,
            reply,
        } => {
            let _ = reply.send(manager.send_message(&text, file_url).await);
        }
        Command::SendTyping => manager.send_typing_status(),
        Command::Close { reply } => {
            manager.close();
            let _ = reply.send(());
        }
        Command::Failure { reply } => {
            let _ = reply.send(manager.failure());
        }
        Command::Shutdown { reply } => {
            manager.close();
            let _ = reply.send(());
        }
    }
}
