//! # deskshare-core
//!
//! Shared library for DeskShare containing the session state machine, the
//! media descriptors, and the JSON signaling protocol.
//!
//! This crate has zero dependencies on sockets, async runtimes, or the WebRTC
//! stack.  Everything here can be unit-tested without a network.
//!
//! # Architecture overview (for beginners)
//!
//! DeskShare shares one machine's screen with one remote viewer over WebRTC.
//! Before two peers can exchange media they have to agree on codecs and
//! network paths.  That agreement ("negotiation") travels through a
//! *signaling server*: each client joins a named room and the server relays
//! messages between the two members.
//!
//! - **`domain`** – The room/call lifecycle (`SessionState` and its pure
//!   transition table), the media stream descriptors, and `SessionConfig`.
//!
//! - **`protocol`** – What travels through the signaling server: the
//!   negotiation payloads (`SignalingMessage`), the frames that wrap them
//!   (`ClientFrame` / `ServerFrame`), and the ICE relay-server configuration.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `deskshare_core::SessionState` instead of the full module path.
pub use domain::config::{OfferOptions, SessionConfig};
pub use domain::media::{CaptureConstraints, LocalStream, LocalTrack, RemoteTrack, TrackKind};
pub use domain::session::{transition, Effect, MembershipEvent, SessionState, Transition};
pub use protocol::ice::{IceConfig, IceServer};
pub use protocol::messages::{IceCandidate, MessageKind, SignalingMessage};
pub use protocol::wire::{ClientFrame, ServerFrame};
pub use protocol::{ProtocolError, RoundCounter};
