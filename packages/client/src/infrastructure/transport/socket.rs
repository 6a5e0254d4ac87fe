//! WebSocket pump shared by both bindings.
//!
//! Each link runs one task that owns the socket. Outbound text is queued on
//! an unbounded channel; inbound text is handed to a binding-specific
//! decoder, which reports through the link's `TransportSink`. Closing the
//! handle while the handshake is still in flight abandons the handshake.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::realtime::{TransportError, TransportSink};

/// Binding-specific handling of inbound text messages
pub(crate) trait InboundDecoder: Send + 'static {
    /// Handle one inbound text message. An error fails the link.
    fn decode(&mut self, text: &str, sink: &TransportSink) -> Result<(), TransportError>;

    /// How long the open link may stay silent before [`InboundDecoder::settled`] runs
    fn settle_after(&self) -> Option<Duration> {
        None
    }

    /// The link stayed open for `settle_after` without being closed
    fn settled(&mut self, _sink: &TransportSink) {}
}

enum Outgoing {
    Text(String),
    Close,
}

/// Owning handle of one socket task
pub(crate) struct SocketHandle {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    closed: bool,
}

impl SocketHandle {
    /// Start connecting to `url` in the background
    pub(crate) fn spawn<D: InboundDecoder>(url: String, sink: TransportSink, decoder: D) -> Self {
        let (outgoing, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url, sink, decoder, rx));
        Self {
            outgoing,
            closed: false,
        }
    }

    /// Queue a text message
    pub(crate) fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send("socket is closed".to_string()));
        }
        self.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| TransportError::Send("socket task has stopped".to_string()))
    }

    /// Close after flushing queued messages. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Join a base endpoint and a path, checking the scheme
pub(crate) fn endpoint_url(endpoint: &str, path: &str) -> Result<String, TransportError> {
    let base = endpoint.trim_end_matches('/');
    if !(base.starts_with("ws://") || base.starts_with("wss://")) {
        return Err(TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "expected a ws:// or wss:// URL".to_string(),
        });
    }
    Ok(format!("{base}{path}"))
}

async fn run_socket<D: InboundDecoder>(
    url: String,
    sink: TransportSink,
    mut decoder: D,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    debug!(url = %url, generation = sink.generation(), "Opening WebSocket");
    let mut queued_early = Vec::new();
    let connecting = connect_async(url.as_str());
    tokio::pin!(connecting);
    let stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok((stream, _response)) => break stream,
                Err(error) => {
                    sink.failed(TransportError::Connect(error.to_string()));
                    return;
                }
            },
            queued = outgoing.recv() => match queued {
                Some(Outgoing::Text(text)) => queued_early.push(text),
                Some(Outgoing::Close) | None => {
                    debug!(
                        generation = sink.generation(),
                        "WebSocket closed before the handshake finished"
                    );
                    return;
                }
            },
        }
    };
    let (mut write, mut read) = stream.split();
    for text in queued_early {
        if let Err(error) = write.send(Message::Text(text.into())).await {
            sink.failed(TransportError::Send(error.to_string()));
            return;
        }
    }
    sink.opened();

    let settle_after = decoder.settle_after();
    let settle = tokio::time::sleep(settle_after.unwrap_or_default());
    tokio::pin!(settle);
    let mut settling = settle_after.is_some();

    loop {
        tokio::select! {
            queued = outgoing.recv() => match queued {
                Some(Outgoing::Text(text)) => {
                    trace!(generation = sink.generation(), "Sending text frame");
                    if let Err(error) = write.send(Message::Text(text.into())).await {
                        sink.failed(TransportError::Send(error.to_string()));
                        return;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    debug!(generation = sink.generation(), "WebSocket closed");
                    return;
                }
            },
            () = &mut settle, if settling => {
                settling = false;
                decoder.settled(&sink);
            }
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Err(error) = decoder.decode(text.as_str(), &sink) {
                        sink.failed(error);
                        let _ = write.close().await;
                        return;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    sink.closed(reason);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    sink.failed(TransportError::Receive(error.to_string()));
                    return;
                }
                None => {
                    sink.closed("stream ended");
                    return;
                }
            },
        }
    }
}
