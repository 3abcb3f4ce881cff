//! Events consumed by the session controller task.
//!
//! All three sources (the user, the signaling channel, and the peer
//! connection's observers) post into one unbounded mpsc queue.  The
//! controller drains it one event at a time and runs each handler to
//! completion, which is what keeps negotiation steps ordered.

use deskshare_core::{IceCandidate, MembershipEvent, RemoteTrack, ServerFrame};
use serde_json::Value;
use tokio::sync::mpsc;

/// A command issued by the local user (the connect / leave buttons).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Connect,
    Leave,
}

/// An event raised by the signaling channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    Joined { room: String, peer_id: String },
    OtherJoin { room: String, peer_id: String },
    Full { room: String, peer_id: String },
    Leaved { room: String, peer_id: String },
    Bye { room: String, peer_id: String },
    /// A relayed negotiation payload, still undecoded.
    Message {
        room: String,
        peer_id: String,
        data: Value,
    },
    /// The transport dropped without a local `disconnect()`.
    Disconnected { reason: String },
}

impl SignalEvent {
    /// The membership event this maps to, or `None` for `Message`.
    pub fn membership(&self) -> Option<MembershipEvent> {
        match self {
            SignalEvent::Joined { .. } => Some(MembershipEvent::Joined),
            SignalEvent::OtherJoin { .. } => Some(MembershipEvent::OtherJoin),
            SignalEvent::Full { .. } => Some(MembershipEvent::Full),
            SignalEvent::Leaved { .. } => Some(MembershipEvent::Leaved),
            SignalEvent::Bye { .. } => Some(MembershipEvent::Bye),
            SignalEvent::Disconnected { .. } => Some(MembershipEvent::Disconnected),
            SignalEvent::Message { .. } => None,
        }
    }

    /// The room named by the frame, if any.
    pub fn room(&self) -> Option<&str> {
        match self {
            SignalEvent::Joined { room, .. }
            | SignalEvent::OtherJoin { room, .. }
            | SignalEvent::Full { room, .. }
            | SignalEvent::Leaved { room, .. }
            | SignalEvent::Bye { room, .. }
            | SignalEvent::Message { room, .. } => Some(room),
            SignalEvent::Disconnected { .. } => None,
        }
    }
}

impl From<ServerFrame> for SignalEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Joined { room, id } => SignalEvent::Joined { room, peer_id: id },
            ServerFrame::OtherJoin { room, id } => SignalEvent::OtherJoin { room, peer_id: id },
            ServerFrame::Full { room, id } => SignalEvent::Full { room, peer_id: id },
            ServerFrame::Leaved { room, id } => SignalEvent::Leaved { room, peer_id: id },
            ServerFrame::Bye { room, id } => SignalEvent::Bye { room, peer_id: id },
            ServerFrame::Message { room, id, data } => SignalEvent::Message {
                room,
                peer_id: id,
                data,
            },
        }
    }
}

/// Coarse peer-connection state, reported for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// An event raised by a peer connection's observers.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// ICE discovered a local candidate that must be sent to the remote side.
    LocalCandidate(IceCandidate),
    /// Remote media arrived.
    RemoteTrack(RemoteTrack),
    StateChanged(PeerStatus),
}

/// Everything the controller task reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    User(UserCommand),
    /// Inbound event from the signaling connection numbered `generation`.
    Signal { generation: u64, event: SignalEvent },
    /// Observer event from the peer connection numbered `generation`.
    Peer { generation: u64, event: PeerEvent },
    /// Leave if needed, then stop the controller task.
    Shutdown,
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;
