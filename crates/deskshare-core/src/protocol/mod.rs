//! Signaling protocol: negotiation payloads, wire frames, and ICE settings.
//!
//! Everything that crosses the signaling server is JSON text.  Payloads from
//! the server are untrusted, so every decode path returns a
//! [`ProtocolError`] instead of panicking.

pub mod ice;
pub mod messages;
pub mod round;
pub mod wire;

pub use round::RoundCounter;

use thiserror::Error;

/// Errors that can occur while decoding signaling traffic or validating
/// relay-server configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The payload has no `type` discriminator.
    #[error("signaling payload has no \"type\" field")]
    MissingType,

    /// The `type` discriminator is not `offer`, `answer` or `candidate`.
    #[error("unknown signaling message type: {0:?}")]
    UnknownType(String),

    /// The payload (or frame) could not be parsed.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A relay-server entry failed validation.
    #[error("invalid ICE server: {0}")]
    InvalidIceServer(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}
