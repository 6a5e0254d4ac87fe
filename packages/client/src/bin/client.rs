//! Kasper chat client CLI.
//!
//! Connects to a chat room, prints incoming messages and room activity, and
//! sends every line typed at the prompt.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kasper-client -- --token <jwt> --user-id u1 --username alice --room general
//! ```
//!
//! Commands:
//! - `/typing`: send a typing notification
//! - `/file <url> [text]`: send a message with an attached file
//! - `/reconnect`: connect again after giving up
//! - `/quit`: leave the room

use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use kasper_client::{
    domain::{
        DomainMessage, RoomId, RoomLogError, RoomMessageStore, UserId, UserIdentity,
        ValueObjectError,
    },
    infrastructure::repository::{InMemoryRoomMessageStore, InMemorySessionStore},
    realtime::{
        BackoffPolicy, ConnectError, ConnectionState, RealtimeClient, RealtimeConfig,
        RealtimeHandle, RoomActivity, SendError, TransportBinding,
        backoff::DEFAULT_RECONNECT_CEILING, config::DEFAULT_ENDPOINT,
    },
};
use kasper_shared::logger::setup_logger;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BindingArg {
    /// One WebSocket per room with a JSON AUTH frame
    Raw,
    /// STOMP over WebSocket
    Stomp,
}

impl From<BindingArg> for TransportBinding {
    fn from(binding: BindingArg) -> Self {
        match binding {
            BindingArg::Raw => TransportBinding::Raw,
            BindingArg::Stomp => TransportBinding::Stomp,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "kasper-client", version, about = "Realtime chat client for Kasper chat rooms")]
struct Args {
    /// Backend base URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Transport binding
    #[arg(long, value_enum, default_value_t = BindingArg::Stomp)]
    binding: BindingArg,

    /// Bearer token of the signed-in user
    #[arg(long)]
    token: Option<String>,

    /// User id of the signed-in user
    #[arg(long)]
    user_id: String,

    /// Display name (defaults to the user id)
    #[arg(long)]
    username: Option<String>,

    /// Room to join
    #[arg(long)]
    room: String,

    /// Automatic reconnect attempts before giving up
    #[arg(long, default_value_t = DEFAULT_RECONNECT_CEILING)]
    max_reconnect_attempts: u32,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValueObjectError),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Quit,
    Typing,
    Reconnect,
    File { url: String, text: String },
    Message(String),
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));
    match name {
        "quit" | "exit" => Input::Quit,
        "typing" => Input::Typing,
        "reconnect" => Input::Reconnect,
        "file" if !rest.is_empty() => {
            let (url, text) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(url, text)| (url, text.trim()));
            Input::File {
                url: url.to_string(),
                text: text.to_string(),
            }
        }
        _ => Input::Unknown(name.to_string()),
    }
}

/// Room log that also prints messages from other users
struct ConsoleRoomStore {
    me: UserId,
    inner: InMemoryRoomMessageStore,
}

#[async_trait]
impl RoomMessageStore for ConsoleRoomStore {
    async fn add_message(&self, message: DomainMessage) -> Result<(), RoomLogError> {
        let line = format_message(&message);
        let from_me = message.sender.id == self.me;
        self.inner.add_message(message).await?;
        if !from_me {
            println!("{line}");
        }
        Ok(())
    }

    async fn messages(&self, room_id: &RoomId) -> Vec<DomainMessage> {
        self.inner.messages(room_id).await
    }
}

fn format_message(message: &DomainMessage) -> String {
    let time = message
        .created_at
        .value()
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    match &message.file_url {
        Some(url) => format!(
            "[{time}] {}: {} ({url})",
            message.sender.username, message.message
        ),
        None => format!("[{time}] {}: {}", message.sender.username, message.message),
    }
}

fn state_banner(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "* disconnected",
        ConnectionState::Connecting => "* connecting...",
        ConnectionState::Connected => "* connected",
        ConnectionState::Reconnecting => "* connection lost, reconnecting...",
        ConnectionState::Failed => "* could not reconnect; type /reconnect to try again",
    }
}

async fn print_state_changes(mut state: watch::Receiver<ConnectionState>) {
    while state.changed().await.is_ok() {
        let current = *state.borrow_and_update();
        println!("{}", state_banner(current));
    }
}

async fn print_activity(me: UserId, mut activity: broadcast::Receiver<RoomActivity>) {
    loop {
        match activity.recv().await {
            Ok(event) if event.user().id == me => {}
            Ok(RoomActivity::Joined { user, .. }) => println!("* {} joined", user.username),
            Ok(RoomActivity::Left { user, .. }) => println!("* {} left", user.username),
            Ok(RoomActivity::Typing { user, .. }) => println!("* {} is typing...", user.username),
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Read lines on a dedicated thread so the prompt never blocks the runtime
fn spawn_line_reader(prompt: String) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(error) => {
                tracing::error!("Failed to initialize line editor: {}", error);
                return;
            }
        };
        loop {
            match editor.readline(&prompt) {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    let quit = parse_input(&line) == Input::Quit;
                    if tx.blocking_send(line).is_err() || quit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(error) => {
                    tracing::warn!("Failed to read input: {}", error);
                    break;
                }
            }
        }
    });
    rx
}

async fn send(client: &RealtimeHandle, text: String, file_url: Option<String>) {
    match client.send_message(text, file_url).await {
        Ok(_) => {}
        Err(SendError::NotConnected) => println!("! not connected; message not sent"),
        Err(error) => println!("! message not sent: {error}"),
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let user_id = UserId::try_from(args.user_id.as_str())?;
    let room_id = RoomId::try_from(args.room.as_str())?;
    let username = args.username.unwrap_or_else(|| args.user_id.clone());
    let user = UserIdentity::new(user_id.clone(), username);

    let session = Arc::new(match args.token {
        Some(token) => InMemorySessionStore::signed_in(token, user),
        None => InMemorySessionStore::default(),
    });
    let store = Arc::new(ConsoleRoomStore {
        me: user_id.clone(),
        inner: InMemoryRoomMessageStore::new(),
    });
    let config = RealtimeConfig {
        endpoint: args.endpoint,
        binding: args.binding.into(),
        backoff: BackoffPolicy {
            ceiling: args.max_reconnect_attempts,
            ..BackoffPolicy::default()
        },
        ..RealtimeConfig::default()
    };

    let client = RealtimeClient::spawn(config, session, store);
    let state_task = tokio::spawn(print_state_changes(client.watch_state()));
    let activity_task = tokio::spawn(print_activity(user_id, client.activity()));
    client.connect(room_id.clone()).await?;

    let mut lines = spawn_line_reader(format!("{room_id}> "));
    while let Some(line) = lines.recv().await {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Typing => client.send_typing_status().await,
            Input::Reconnect => {
                if let Err(error) = client.connect(room_id.clone()).await {
                    println!("! {error}");
                }
            }
            Input::File { url, text } => send(&client, text, Some(url)).await,
            Input::Message(text) => send(&client, text, None).await,
            Input::Unknown(name) => println!("! unknown command /{name}"),
        }
    }

    client.shutdown().await;
    state_task.abort();
    activity_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
