//! WebSocket transport built on tokio-tungstenite.
//!
//! Each [`WsConnector::open`] spawns one task that performs the handshake and
//! then pumps frames in both directions until the socket closes.
//!
//! # Event Mapping
//!
//! | Wire | Event |
//! |------|-------|
//! | handshake done | `Opened` |
//! | Text / Binary frame | `Message` |
//! | Pong frame | `LivenessResponse` |
//! | Close frame | `Closed { code }` (1005 if the frame carried none) |
//! | I/O or protocol error | `Errored`, then `Closed { 1006 }` |
//! | stream ended | `Closed { 1006 }` |
//!
//! A close or terminate requested through [`Socket`] raises no event; the
//! monitor has already moved on.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{ABNORMAL_CLOSURE, SocketEvent};

use super::socket::{Connector, EventSink, Socket};

// ============================================================================
// Constants
// ============================================================================

/// Close code reported for a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

// ============================================================================
// Outgoing
// ============================================================================

/// Work queued for the socket task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Ping,
    Close,
    Terminate,
}

// ============================================================================
// WsConnector
// ============================================================================

/// Opens tokio-tungstenite sockets (`ws://` and `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, events: EventSink) -> Result<Arc<dyn Socket>> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::invalid_endpoint(url, "scheme must be ws or wss"));
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(parsed.to_string(), events, outgoing_rx));

        Ok(Arc::new(WsSocket {
            outgoing: outgoing_tx,
        }))
    }
}

// ============================================================================
// WsSocket
// ============================================================================

/// Handle to a socket task.
#[derive(Debug)]
struct WsSocket {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl WsSocket {
    fn queue(&self, item: Outgoing) -> Result<()> {
        self.outgoing
            .send(item)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Socket for WsSocket {
    fn send_text(&self, text: String) -> Result<()> {
        self.queue(Outgoing::Text(text))
    }

    fn ping(&self) -> Result<()> {
        self.queue(Outgoing::Ping)
    }

    fn close(&self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }

    fn terminate(&self) {
        let _ = self.outgoing.send(Outgoing::Terminate);
    }
}

// ============================================================================
// Socket Task
// ============================================================================

/// Handshake, then frame pump.
async fn run_socket(
    url: String,
    events: EventSink,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    let generation = events.generation();

    // Anything queued before the handshake completes means the monitor gave
    // up on this socket.
    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                debug!(generation, error = %e, "WebSocket handshake failed");
                events.emit(SocketEvent::errored(e.to_string()));
                events.emit(SocketEvent::closed(ABNORMAL_CLOSURE));
                return;
            }
        },

        _ = outgoing_rx.recv() => {
            debug!(generation, "Handshake abandoned");
            return;
        }
    };

    if events.is_closed() {
        debug!(generation, "Monitor stopped during handshake, dropping socket");
        return;
    }

    debug!(generation, url = %url, "WebSocket connected");
    events.emit(SocketEvent::Opened);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(generation, len = text.len(), "Text frame received");
                        events.emit(SocketEvent::message(Message::Text(text).into_data()));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        events.emit(SocketEvent::message(data));
                    }

                    Some(Ok(Message::Pong(_))) => {
                        events.emit(SocketEvent::LivenessResponse);
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                        debug!(generation, code, "WebSocket closed by remote");
                        events.emit(SocketEvent::closed(code));
                        break;
                    }

                    Some(Err(e)) => {
                        warn!(generation, error = %e, "WebSocket error");
                        events.emit(SocketEvent::errored(e.to_string()));
                        events.emit(SocketEvent::closed(ABNORMAL_CLOSURE));
                        break;
                    }

                    None => {
                        debug!(generation, "WebSocket stream ended");
                        events.emit(SocketEvent::closed(ABNORMAL_CLOSURE));
                        break;
                    }

                    // Ping is answered by tungstenite, Frame is never yielded on read
                    Some(Ok(_)) => {}
                }
            }

            item = outgoing_rx.recv() => {
                match item {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(generation, error = %e, "Failed to send frame");
                        }
                    }

                    Some(Outgoing::Ping) => {
                        if let Err(e) = ws_write.send(Message::Ping(Default::default())).await {
                            debug!(generation, error = %e, "Failed to send ping");
                        }
                    }

                    Some(Outgoing::Close) | None => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        let _ = ws_write.send(Message::Close(Some(frame))).await;
                        let _ = ws_write.close().await;
                        debug!(generation, "WebSocket closed locally");
                        break;
                    }

                    Some(Outgoing::Terminate) => {
                        debug!(generation, "WebSocket terminated");
                        break;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
