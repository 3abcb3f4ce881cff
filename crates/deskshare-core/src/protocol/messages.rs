//! Negotiation payloads relayed between the two room members.
//!
//! # Offer, answer, candidate (for beginners)
//!
//! Two WebRTC peers agree on a call in three kinds of messages:
//!
//! 1. **offer** – the caller's session description (SDP): which codecs it
//!    supports and which media it wants to send and receive.
//! 2. **answer** – the callee's session description in response.
//! 3. **candidate** – an ICE candidate: one network address (host, server
//!    reflexive, or TURN relay) the sender can be reached on.  Each side
//!    trickles candidates to the other as it discovers them.
//!
//! The signaling server does not look inside these payloads; it relays the
//! `data` field of a `message` frame verbatim.  That is why decoding here is
//! strict and every failure is a [`ProtocolError`] rather than a panic.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::ProtocolError;

/// An ICE candidate as carried in a `candidate` payload.
///
/// Field names follow the browser's `RTCIceCandidateInit`.  The legacy names
/// `label` (for `sdpMLineIndex`) and `id` (for `sdpMid`) are also accepted;
/// when a payload carries both, the browser name wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CandidateFields")]
pub struct IceCandidate {
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,

    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,

    /// The `candidate:...` attribute line.
    pub candidate: String,
}

/// Inbound shape of [`IceCandidate`] with the browser and legacy names kept
/// apart.
#[derive(Deserialize)]
struct CandidateFields {
    #[serde(rename = "sdpMLineIndex", default)]
    sdp_mline_index: Option<u16>,
    #[serde(default)]
    label: Option<u16>,
    #[serde(rename = "sdpMid", default)]
    sdp_mid: Option<String>,
    #[serde(default)]
    id: Option<String>,
    candidate: String,
}

impl From<CandidateFields> for IceCandidate {
    fn from(fields: CandidateFields) -> Self {
        Self {
            sdp_mline_index: fields.sdp_mline_index.or(fields.label),
            sdp_mid: fields.sdp_mid.or(fields.id),
            candidate: fields.candidate,
        }
    }
}

/// A negotiation payload: the `data` of a `message` frame.
///
/// # Example
///
/// ```rust
/// use deskshare_core::SignalingMessage;
///
/// let json = serde_json::json!({"type": "answer", "sdp": "v=0\r\n", "round": 3});
/// let msg = SignalingMessage::from_value(&json).unwrap();
/// assert_eq!(msg.round(), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    Offer {
        sdp: String,
        /// Negotiation round started by this offer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round: Option<u64>,
    },
    Answer {
        sdp: String,
        /// Round of the offer being answered.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round: Option<u64>,
    },
    Candidate(IceCandidate),
}

/// The discriminator of a [`SignalingMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Offer,
    Answer,
    Candidate,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::Candidate => "candidate",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "offer" => Some(MessageKind::Offer),
            "answer" => Some(MessageKind::Answer),
            "candidate" => Some(MessageKind::Candidate),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalingMessage {
    /// Decodes an untrusted `data` payload.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MissingType`] if there is no string `type` field.
    /// - [`ProtocolError::UnknownType`] if `type` is not a known kind.
    /// - [`ProtocolError::Malformed`] if a required field is missing or has
    ///   the wrong JSON type.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if MessageKind::parse(tag).is_none() {
            return Err(ProtocolError::UnknownType(tag.to_string()));
        }
        Ok(Self::deserialize(value)?)
    }

    /// Decodes a payload from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            SignalingMessage::Offer { .. } => MessageKind::Offer,
            SignalingMessage::Answer { .. } => MessageKind::Answer,
            SignalingMessage::Candidate(_) => MessageKind::Candidate,
        }
    }

    /// The negotiation round, for offers and answers that carry one.
    pub fn round(&self) -> Option<u64> {
        match self {
            SignalingMessage::Offer { round, .. } | SignalingMessage::Answer { round, .. } => {
                *round
            }
            SignalingMessage::Candidate(_) => None,
        }
    }

    pub fn offer(sdp: impl Into<String>, round: u64) -> Self {
        SignalingMessage::Offer {
            sdp: sdp.into(),
            round: Some(round),
        }
    }

    pub fn answer(sdp: impl Into<String>, round: Option<u64>) -> Self {
        SignalingMessage::Answer {
            sdp: sdp.into(),
            round,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
