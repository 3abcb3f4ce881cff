//! Mock signaling channel for tests.
//!
//! Records every outbound frame and lets a test play the signaling server by
//! injecting [`SignalEvent`]s into the controller's queue with
//! [`MockSignalChannel::deliver`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use deskshare_core::{ClientFrame, MessageKind, SignalingMessage};

use crate::application::events::SignalEvent;
use crate::application::signal_channel::{SignalChannel, SignalError, SignalEventSink};

#[derive(Default)]
pub struct MockSignalChannel {
    /// Every frame passed to `send` (including the `join` sent by `connect`).
    pub sent: Mutex<Vec<ClientFrame>>,
    events: Mutex<Option<SignalEventSink>>,
    connected: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    fail_connect: bool,
}

impl MockSignalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose server is unreachable.
    pub fn unreachable() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    /// Posts `event` to the controller as if the server had sent it on the
    /// latest connection.  Returns `false` if `connect` was never called.
    pub fn deliver(&self, event: SignalEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }

    /// Generation of the sink handed to the latest `connect`.
    pub fn connection_generation(&self) -> Option<u64> {
        self.events.lock().unwrap().as_ref().map(SignalEventSink::generation)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.sent.lock().unwrap().clone()
    }

    /// The negotiation payloads sent so far, in order.
    pub fn sent_messages(&self) -> Vec<SignalingMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|f| match f {
                ClientFrame::Message { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Kinds of the negotiation payloads sent so far, in order.
    pub fn sent_kinds(&self) -> Vec<MessageKind> {
        self.sent_messages().iter().map(SignalingMessage::kind).collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl SignalChannel for MockSignalChannel {
    async fn connect(&self, room: &str, events: SignalEventSink) -> Result<(), SignalError> {
        if self.fail_connect {
            return Err(SignalError::Connect {
                url: "mock://signaling".into(),
                reason: "connection refused".into(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().unwrap() = Some(events);
        self.connected.store(true, Ordering::SeqCst);
        self.send(ClientFrame::Join { room: room.into() })
    }

    fn send(&self, frame: ClientFrame) -> Result<(), SignalError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SignalError::NotConnected);
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
