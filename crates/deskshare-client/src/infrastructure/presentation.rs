//! Headless presentation sink.
//!
//! The binary has no window to draw previews into, so `TracingPresentation`
//! turns every presentation call into a log line and keeps a small
//! serializable [`StatusSnapshot`] of what a UI would currently show.  The
//! snapshot is what `main` prints on exit and what a future UI bridge would
//! hand to its frontend as a DTO.

use std::sync::Mutex;

use deskshare_core::{LocalStream, RemoteTrack, SessionState, TrackKind};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::application::presentation::{Notice, PresentationSink};

/// Plain snapshot of the presentation surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: SessionState,
    /// Id of the stream in the local preview, if any.
    pub local_stream: Option<String>,
    /// Kinds of remote tracks currently shown.
    pub remote_tracks: Vec<TrackKind>,
    /// Derived affordances: which of the two buttons would be enabled.
    pub can_connect: bool,
    pub can_leave: bool,
    /// The last notice shown to the user, rendered as text.
    pub last_notice: Option<String>,
}

/// Presentation sink that logs instead of rendering.
pub struct TracingPresentation {
    status: Mutex<StatusSnapshot>,
}

impl TracingPresentation {
    pub fn new() -> Self {
        let state = SessionState::Init;
        Self {
            status: Mutex::new(StatusSnapshot {
                state,
                can_connect: state.can_connect(),
                can_leave: state.can_leave(),
                ..StatusSnapshot::default()
            }),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.with_status(|s| s.clone())
    }

    fn with_status<R>(&self, f: impl FnOnce(&mut StatusSnapshot) -> R) -> R {
        match self.status.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for TracingPresentation {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for TracingPresentation {
    fn show_local_preview(&self, stream: &LocalStream) {
        info!(
            "local preview: stream {} ({} track(s))",
            stream.id,
            stream.tracks.len()
        );
        self.with_status(|s| s.local_stream = Some(stream.id.clone()));
    }

    fn clear_local_preview(&self) {
        info!("local preview cleared");
        self.with_status(|s| s.local_stream = None);
    }

    fn show_remote_track(&self, track: &RemoteTrack) {
        info!(
            "remote {} track {} (stream {})",
            track.kind, track.track_id, track.stream_id
        );
        self.with_status(|s| {
            if !s.remote_tracks.contains(&track.kind) {
                s.remote_tracks.push(track.kind);
            }
        });
    }

    fn clear_remote_preview(&self) {
        info!("remote preview cleared");
        self.with_status(|s| s.remote_tracks.clear());
    }

    fn state_changed(&self, state: SessionState) {
        self.with_status(|s| {
            s.state = state;
            s.can_connect = state.can_connect();
            s.can_leave = state.can_leave();
        });
    }

    fn notify(&self, notice: Notice) {
        let text = match &notice {
            Notice::RoomFull { room } => format!("room {room} is full"),
            Notice::CaptureFailed(reason) => format!("screen capture failed: {reason}"),
            Notice::SignalingUnavailable(reason) => {
                format!("signaling server unavailable: {reason}")
            }
            Notice::Disconnected => "disconnected from signaling server".to_string(),
        };
        match notice {
            Notice::Disconnected | Notice::RoomFull { .. } => warn!("{text}"),
            Notice::CaptureFailed(_) | Notice::SignalingUnavailable(_) => error!("{text}"),
        }
        self.with_status(|s| s.last_notice = Some(text));
    }
}
