//! Session configuration types.
//!
//! [`SessionConfig`] is everything the session controller needs to know to
//! run one screen-sharing attempt: which room to join, which relay servers
//! the peer connection may use, what to capture, and what to ask the remote
//! side to send back.
//!
//! Keeping configuration as a plain struct (no file or environment reads in
//! the domain) lets tests build one with struct-update syntax.  The client's
//! storage layer fills it in from the TOML file and CLI flags.

use serde::{Deserialize, Serialize};

use crate::domain::media::CaptureConstraints;
use crate::protocol::ice::IceConfig;

/// The room joined when nothing else is configured.
pub const DEFAULT_ROOM: &str = "222222";

/// What the local side asks to *receive* when it creates an offer.
///
/// Both default to `true`: a sharer also wants to see and hear the viewer's
/// media if the viewer sends any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferOptions {
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// Runtime configuration for one session.
///
/// # Example
///
/// ```rust
/// use deskshare_core::SessionConfig;
///
/// let cfg = SessionConfig::default();
/// assert_eq!(cfg.room_id, "222222");
/// assert!(cfg.capture.video && cfg.capture.audio);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Name of the signaling room.  Two members make a call.
    pub room_id: String,

    /// STUN/TURN servers handed to every new peer connection.
    pub ice: IceConfig,

    /// What to capture from the local display.
    pub capture: CaptureConstraints,

    /// What to request from the remote peer in outbound offers.
    pub offer: OfferOptions,
}

impl Default for SessionConfig {
    /// | Field    | Default                                    |
    /// |----------|--------------------------------------------|
    /// | room_id  | `"222222"`                                 |
    /// | ice      | one TURN server (see [`IceConfig::default`]) |
    /// | capture  | video + audio                              |
    /// | offer    | receive video + audio                      |
    fn default() -> Self {
        Self {
            room_id: DEFAULT_ROOM.to_string(),
            ice: IceConfig::default(),
            capture: CaptureConstraints::default(),
            offer: OfferOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Returns a copy of the default configuration targeting `room_id`.
    pub fn for_room(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Self::default()
        }
    }
}
