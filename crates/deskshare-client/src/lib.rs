//! deskshare-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does deskshare-client do? (for beginners)
//!
//! The client shares the local screen with one remote viewer:
//!
//! 1. Captures the display (and system audio) through a [`CaptureSource`].
//! 2. Connects to a signaling server over WebSocket and joins a room.
//! 3. When a second member joins, creates a WebRTC peer connection and sends
//!    an *offer*; the other side replies with an *answer*.
//! 4. Both sides trickle ICE candidates through the signaling server until
//!    a network path is found and media flows peer-to-peer.
//! 5. Tears everything down when either side leaves, the room is full, or
//!    the signaling connection drops.
//!
//! Every step above is driven by one [`SessionController`] task that drains
//! a single event queue, so negotiation steps never interleave.
//!
//! [`CaptureSource`]: application::media_capture::CaptureSource
//! [`SessionController`]: application::session_controller::SessionController

/// Application layer: the session controller and the traits it drives.
pub mod application;

/// Infrastructure layer: WebSocket signaling, WebRTC, capture, config, mocks.
pub mod infrastructure;
