//! JSON frames exchanged with the signaling server.
//!
//! Every WebSocket text frame is one JSON object whose `event` field names
//! the frame:
//!
//! ```text
//! client → server   {"event":"join","room":"222222"}
//!                   {"event":"leave","room":"222222"}
//!                   {"event":"message","room":"222222","data":{...}}
//!
//! server → client   {"event":"joined","room":"222222","id":"<peer id>"}
//!                   {"event":"otherjoin", ...}  {"event":"full", ...}
//!                   {"event":"leaved", ...}     {"event":"bye", ...}
//!                   {"event":"message","room":"222222","id":"<sender>","data":{...}}
//! ```
//!
//! Inbound `message` frames keep `data` as raw JSON.  The controller decodes
//! it with [`SignalingMessage::from_value`] so that one bad payload is
//! dropped without discarding the frame's routing fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::messages::SignalingMessage;
use crate::protocol::ProtocolError;

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientFrame {
    Join { room: String },
    Leave { room: String },
    Message { room: String, data: SignalingMessage },
}

impl ClientFrame {
    /// Serializes the frame to JSON text.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn room(&self) -> &str {
        match self {
            ClientFrame::Join { room }
            | ClientFrame::Leave { room }
            | ClientFrame::Message { room, .. } => room,
        }
    }

    /// Short name for logs.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientFrame::Join { .. } => "join",
            ClientFrame::Leave { .. } => "leave",
            ClientFrame::Message { .. } => "message",
        }
    }
}

/// A frame sent by the signaling server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerFrame {
    /// We were admitted to `room`.
    Joined {
        #[serde(default)]
        room: String,
        #[serde(default)]
        id: String,
    },
    /// Another member (`id`) entered the room.
    OtherJoin {
        #[serde(default)]
        room: String,
        #[serde(default)]
        id: String,
    },
    /// The room is at capacity.
    Full {
        #[serde(default)]
        room: String,
        #[serde(default)]
        id: String,
    },
    /// Our leave request was processed.
    Leaved {
        #[serde(default)]
        room: String,
        #[serde(default)]
        id: String,
    },
    /// The other member (`id`) left.
    Bye {
        #[serde(default)]
        room: String,
        #[serde(default)]
        id: String,
    },
    /// A relayed negotiation payload from member `id`.
    Message {
        #[serde(default)]
        room: String,
        #[serde(default)]
        id: String,
        data: Value,
    },
}

impl ServerFrame {
    /// Parses one inbound text frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Malformed`] for invalid JSON, a missing or unknown
    /// `event`, or a `message` frame without `data`.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn room(&self) -> &str {
        match self {
            ServerFrame::Joined { room, .. }
            | ServerFrame::OtherJoin { room, .. }
            | ServerFrame::Full { room, .. }
            | ServerFrame::Leaved { room, .. }
            | ServerFrame::Bye { room, .. }
            | ServerFrame::Message { room, .. } => room,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
