//! WebSocket signaling channel.
//!
//! # Task layout
//!
//! `connect()` performs the WebSocket handshake and splits the stream into
//! two halves, each owned by its own task:
//!
//! ```text
//!   send(frame) ──► mpsc ──► writer task ──► WebSocket sink
//!
//!   WebSocket stream ──► reader task ──► ServerFrame::from_json
//!                                          └──► SignalEventSink ──► controller queue
//! ```
//!
//! Decoupling `send` from the socket through an mpsc channel keeps `send`
//! synchronous and non-blocking (fire-and-forget), and keeps outbound frames
//! in the order the controller produced them.
//!
//! The reader skips frames that fail to parse.  When the stream ends it posts
//! `SignalEvent::Disconnected`, unless the end was caused by a local
//! `disconnect()`; a deliberate disconnect aborts the reader first.  Every
//! event goes out through the sink handed to `connect`, so it carries that
//! connection's generation.

use std::sync::Mutex;

use async_trait::async_trait;
use deskshare_core::{ClientFrame, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, info, warn};

use crate::application::events::SignalEvent;
use crate::application::signal_channel::{SignalChannel, SignalError, SignalEventSink};

struct Connection {
    outbound: mpsc::UnboundedSender<WsMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Signaling over one WebSocket connection to `url`.
pub struct WsSignalChannel {
    url: String,
    conn: Mutex<Option<Connection>>,
}

impl WsSignalChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn take_connection(&self) -> Option<Connection> {
        match self.conn.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn store_connection(&self, conn: Connection) {
        match self.conn.lock() {
            Ok(mut guard) => *guard = Some(conn),
            Err(poisoned) => *poisoned.into_inner() = Some(conn),
        }
    }
}

/// Reads frames until the stream ends; returns the reason it ended.
async fn read_frames<S>(mut stream: S, events: &SignalEventSink) -> String
where
    S: futures_util::Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        let msg = match stream.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                return "connection closed".into();
            }
            Some(Err(e)) => return format!("transport error: {e}"),
            None => return "stream ended".into(),
        };

        match msg {
            WsMessage::Text(text) => match ServerFrame::from_json(&text) {
                Ok(frame) => {
                    debug!("signaling ← {}", frame_name(&frame));
                    if !events.emit(frame.into()) {
                        return "controller stopped".into();
                    }
                }
                Err(e) => warn!("skipping unparseable signaling frame: {e}"),
            },
            WsMessage::Close(frame) => {
                return match frame {
                    Some(f) => format!("server closed: {} {}", f.code, f.reason),
                    None => "server closed".into(),
                };
            }
            WsMessage::Binary(_) => warn!("unexpected binary signaling frame (ignored)"),
            // Ping/Pong are answered by tungstenite.
            _ => {}
        }
    }
}

fn frame_name(frame: &ServerFrame) -> &'static str {
    match frame {
        ServerFrame::Joined { .. } => "joined",
        ServerFrame::OtherJoin { .. } => "otherjoin",
        ServerFrame::Full { .. } => "full",
        ServerFrame::Leaved { .. } => "leaved",
        ServerFrame::Bye { .. } => "bye",
        ServerFrame::Message { .. } => "message",
    }
}

#[async_trait]
impl SignalChannel for WsSignalChannel {
    async fn connect(&self, room: &str, events: SignalEventSink) -> Result<(), SignalError> {
        self.disconnect().await;

        let (ws, _response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| SignalError::Connect {
                    url: self.url.clone(),
                    reason: e.to_string(),
                })?;
        info!("signaling connected to {}", self.url);

        let (mut sink, stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!("signaling send failed: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            let reason = read_frames(stream, &events).await;
            info!("signaling transport ended: {reason}");
            events.emit(SignalEvent::Disconnected { reason });
        });

        self.store_connection(Connection {
            outbound,
            reader,
            writer,
        });
        self.send(ClientFrame::Join { room: room.into() })
    }

    fn send(&self, frame: ClientFrame) -> Result<(), SignalError> {
        let text = frame.to_json()?;
        let guard = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let conn = guard.as_ref().ok_or(SignalError::NotConnected)?;
        debug!("signaling → {} ({})", frame.event_name(), frame.room());
        conn.outbound
            .send(WsMessage::Text(text))
            .map_err(|_| SignalError::NotConnected)
    }

    async fn disconnect(&self) {
        let Some(conn) = self.take_connection() else {
            return;
        };
        // Abort the reader first so the close below does not surface as a
        // transport drop.
        conn.reader.abort();
        let _ = conn.outbound.send(WsMessage::Close(None));
        drop(conn.outbound);
        if let Err(e) = conn.writer.await {
            debug!("signaling writer ended abnormally: {e}");
        }
        info!("signaling disconnected from {}", self.url);
    }

    fn is_connected(&self) -> bool {
        let guard = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .is_some_and(|c| !c.reader.is_finished() && !c.outbound.is_closed())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
