//! The signaling transport seen from the session controller.
//!
//! A `SignalChannel` carries JSON frames between this client and the
//! signaling server.  Inbound frames become `SignalEvent`s posted to the
//! controller's queue; outbound frames are fire-and-forget.
//!
//! Every `connect` gets a fresh [`SignalEventSink`] whose events carry that
//! connection's generation.  A frame still queued from a previous connection
//! (say, the `leaved` ack of the last session) is then recognisable as stale
//! and discarded by the controller.

use async_trait::async_trait;
use deskshare_core::{ClientFrame, ProtocolError};
use thiserror::Error;

use crate::application::events::{EventSender, SessionEvent, SignalEvent};

/// Errors that can occur on the signaling channel.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The transport could not be established.
    #[error("failed to connect to signaling server {url}: {reason}")]
    Connect { url: String, reason: String },

    /// `send` was called while no transport is open.
    #[error("signaling channel is not connected")]
    NotConnected,

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] ProtocolError),
}

/// Where one signaling connection posts its inbound events.
#[derive(Debug, Clone)]
pub struct SignalEventSink {
    generation: u64,
    tx: EventSender,
}

impl SignalEventSink {
    pub fn new(generation: u64, tx: EventSender) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Posts `event`.  Returns `false` if the controller has stopped.
    pub fn emit(&self, event: SignalEvent) -> bool {
        self.tx
            .send(SessionEvent::Signal {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Duplex message transport to a signaling server.
#[async_trait]
pub trait SignalChannel: Send + Sync {
    /// Opens the transport, starts forwarding inbound frames to `events`,
    /// and sends `join(room)`.
    ///
    /// A previous connection, if any, is closed first.
    async fn connect(&self, room: &str, events: SignalEventSink) -> Result<(), SignalError>;

    /// Queues one frame for sending.  No acknowledgement, no retry.
    fn send(&self, frame: ClientFrame) -> Result<(), SignalError>;

    /// Closes the transport.  Does not emit a `Disconnected` event.
    /// No-op when not connected.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}
