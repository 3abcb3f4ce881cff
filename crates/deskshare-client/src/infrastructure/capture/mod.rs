//! Display capture sources.
//!
//! The host's screen-capture API is an external capability.  This module
//! provides the descriptor-level source the binary uses, plus test doubles:
//!
//! - **`SyntheticCapture`** – produces a stream with one video track per
//!   requested display and a system-audio track, with fresh UUIDs.  It does
//!   not grab pixels; encoded samples are pushed into the peer's tracks by
//!   the platform capture pipeline.
//! - **`mock`** – a recording source with denial/unsupported switches.

pub mod mock;

use async_trait::async_trait;
use deskshare_core::{CaptureConstraints, LocalStream, LocalTrack, TrackKind};
use tracing::debug;
use uuid::Uuid;

use crate::application::media_capture::{CaptureError, CaptureSource};

/// Descriptor-only capture source for the primary display.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    display_label: String,
}

impl SyntheticCapture {
    pub fn new(display_label: impl Into<String>) -> Self {
        Self {
            display_label: display_label.into(),
        }
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new("screen:0")
    }
}

#[async_trait]
impl CaptureSource for SyntheticCapture {
    fn is_supported(&self) -> bool {
        true
    }

    async fn acquire(&self, constraints: CaptureConstraints) -> Result<LocalStream, CaptureError> {
        let tracks = constraints
            .kinds()
            .into_iter()
            .map(|kind| {
                let label = match kind {
                    TrackKind::Video => self.display_label.clone(),
                    TrackKind::Audio => "system-audio".to_string(),
                };
                LocalTrack::new(Uuid::new_v4().to_string(), kind, label)
            })
            .collect::<Vec<_>>();
        let stream = LocalStream::new(Uuid::new_v4().to_string(), tracks);
        debug!("synthetic capture produced stream {}", stream.id);
        Ok(stream)
    }
}
