//! MediaCaptureController: acquires and releases the local display stream.
//!
//! The host's capture API (screen + system audio) sits behind the
//! [`CaptureSource`] trait.  The controller adds the bookkeeping the session
//! needs on top of it: at most one stream is held at a time, and every
//! acquired stream is stopped exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use deskshare_core::{CaptureConstraints, LocalStream};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for capture operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The host cannot capture (no display, no permission API) or the
    /// request asked for nothing.
    #[error("display capture unsupported: {0}")]
    Unsupported(String),

    /// The user or the OS refused the capture request.
    #[error("display capture denied: {0}")]
    Denied(String),

    /// The source succeeded but produced a stream without tracks.
    #[error("capture produced no tracks")]
    NoTracks,
}

/// Host display/audio capture capability.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Returns `false` if the host has no way to capture the display at all.
    fn is_supported(&self) -> bool;

    /// Requests a stream matching `constraints`.
    async fn acquire(&self, constraints: CaptureConstraints) -> Result<LocalStream, CaptureError>;
}

/// Holds the current capture stream, if any.
pub struct MediaCaptureController {
    source: Arc<dyn CaptureSource>,
    stream: Option<LocalStream>,
}

impl MediaCaptureController {
    pub fn new(source: Arc<dyn CaptureSource>) -> Self {
        Self {
            source,
            stream: None,
        }
    }

    /// Acquires a capture stream, or returns the one already held.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::Unsupported`] if the constraints request neither
    ///   audio nor video, or the source reports no capture support.
    /// - Whatever the source returns on denial.
    /// - [`CaptureError::NoTracks`] if the source returned an empty stream.
    pub async fn acquire(
        &mut self,
        constraints: CaptureConstraints,
    ) -> Result<&LocalStream, CaptureError> {
        if self.stream.as_ref().is_some_and(|s| !s.is_ended()) {
            debug!("capture already held; reusing stream");
        } else {
            if !constraints.requests_anything() {
                return Err(CaptureError::Unsupported(
                    "constraints request neither audio nor video".into(),
                ));
            }
            if !self.source.is_supported() {
                return Err(CaptureError::Unsupported(
                    "no display capture available on this host".into(),
                ));
            }
            let stream = self.source.acquire(constraints).await?;
            if stream.tracks.is_empty() {
                return Err(CaptureError::NoTracks);
            }
            info!(
                "capture acquired: stream {} with {} track(s)",
                stream.id,
                stream.tracks.len()
            );
            self.stream = Some(stream);
        }
        self.stream.as_ref().ok_or(CaptureError::NoTracks)
    }

    /// Stops every track and forgets the stream.  Returns `true` if a stream
    /// was held.  No-op otherwise.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(stream) => {
                let stopped = stream.stop_all();
                info!("capture released: stream {} ({stopped} track(s) stopped)", stream.id);
                true
            }
            None => false,
        }
    }

    pub fn stream(&self) -> Option<&LocalStream> {
        self.stream.as_ref()
    }

    pub fn is_holding(&self) -> bool {
        self.stream.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
