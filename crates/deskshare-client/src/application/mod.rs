//! Application layer for the screen-sharing client.
//!
//! # What lives here?
//!
//! - **`events`** – The closed set of events the controller task consumes:
//!   user commands, signaling events, and peer-connection observer events.
//!
//! - **`session_controller`** – The session state machine.  Feeds membership
//!   events through [`deskshare_core::transition`] and runs the resulting
//!   side effects against the collaborators below.
//!
//! - **`peer_manager`** – Owns the peer connection: creation, track
//!   attachment, offer/answer, candidate queuing.  The WebRTC stack itself is
//!   behind the `PeerConnector` / `PeerLink` traits.
//!
//! - **`media_capture`** – Acquires and releases the local display stream
//!   through the `CaptureSource` trait.
//!
//! - **`signal_channel`** – The `SignalChannel` trait: duplex transport to
//!   the signaling server.
//!
//! - **`presentation`** – The `PresentationSink` trait: where previews,
//!   state changes and user notices go.
//!
//! Nothing in this module opens a socket or touches the WebRTC stack
//! directly; those adapters live in `infrastructure` and are injected.

pub mod events;
pub mod media_capture;
pub mod peer_manager;
pub mod presentation;
pub mod session_controller;
pub mod signal_channel;
