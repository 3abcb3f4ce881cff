//! Media stream descriptors.
//!
//! These types describe *what* is being captured and received, not the pixels
//! themselves.  Encoding and transport belong to the WebRTC stack; the session
//! only needs to know which tracks exist, attach them to the peer connection,
//! and stop them exactly once on teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// What the user asked the host to capture.
///
/// Mirrors the `{video, audio}` constraints object of a display-capture
/// request.  Both default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    #[serde(default = "default_true")]
    pub video: bool,
    #[serde(default = "default_true")]
    pub audio: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

impl CaptureConstraints {
    /// Returns `true` if at least one kind of media is requested.
    pub fn requests_anything(&self) -> bool {
        self.video || self.audio
    }

    /// The track kinds requested, video first.
    pub fn kinds(&self) -> Vec<TrackKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.video {
            kinds.push(TrackKind::Video);
        }
        if self.audio {
            kinds.push(TrackKind::Audio);
        }
        kinds
    }
}

/// One captured track.
///
/// Clones share the same "ended" flag, so the capture source that produced
/// the track sees the stop as soon as the session calls [`LocalTrack::stop`].
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
    /// Human-readable source label, e.g. `"screen:0"`.
    pub label: String,
    ended: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the track.  Returns `true` only for the call that actually
    /// ended it, so callers can count releases.
    pub fn stop(&self) -> bool {
        !self.ended.swap(true, Ordering::AcqRel)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

/// A captured stream: an id plus its tracks.
#[derive(Debug, Clone)]
pub struct LocalStream {
    pub id: String,
    pub tracks: Vec<LocalTrack>,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Stops every track; returns how many were still live.
    pub fn stop_all(&self) -> usize {
        self.tracks.iter().filter(|t| t.stop()).count()
    }

    /// Returns `true` once every track has been stopped.
    pub fn is_ended(&self) -> bool {
        self.tracks.iter().all(LocalTrack::is_ended)
    }

    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}

/// A media track received from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub stream_id: String,
    pub track_id: String,
    pub kind: TrackKind,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
