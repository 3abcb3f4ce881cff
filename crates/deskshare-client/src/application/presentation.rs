//! The rendering surface, as far as the session controller is concerned.
//!
//! The controller never draws anything.  It tells a `PresentationSink` which
//! stream to show in the local and remote preview, which state the session
//! is in (so the connect/leave affordances can be toggled), and when the
//! user needs to be told something.

use deskshare_core::{LocalStream, RemoteTrack, SessionState};

/// Something the user must be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The room already has two members.
    RoomFull { room: String },
    /// Display capture failed; the session stays in `init`.
    CaptureFailed(String),
    /// The signaling server could not be reached.
    SignalingUnavailable(String),
    /// The signaling connection dropped during a session.
    Disconnected,
}

/// Output side of the client.
#[cfg_attr(test, mockall::automock)]
pub trait PresentationSink: Send + Sync {
    fn show_local_preview(&self, stream: &LocalStream);
    fn clear_local_preview(&self);
    fn show_remote_track(&self, track: &RemoteTrack);
    fn clear_remote_preview(&self);
    fn state_changed(&self, state: SessionState);
    fn notify(&self, notice: Notice);
}
