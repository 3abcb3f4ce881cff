//! Mock capture source for tests.
//!
//! Every stream handed out is also kept in `issued`, so tests can check that
//! the session stopped each track (the clones share the "ended" flag).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use deskshare_core::{CaptureConstraints, LocalStream, LocalTrack};

use crate::application::media_capture::{CaptureError, CaptureSource};

#[derive(Default)]
pub struct MockCaptureSource {
    /// Streams handed out, in order.
    pub issued: Mutex<Vec<LocalStream>>,
    counter: AtomicU64,
    unsupported: bool,
    deny: bool,
}

impl MockCaptureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host without display capture.
    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    /// A host where the user dismisses the capture prompt.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    pub fn acquire_count(&self) -> usize {
        self.issued.lock().unwrap().len()
    }

    /// Returns `true` if every stream ever issued has been stopped.
    pub fn all_released(&self) -> bool {
        self.issued.lock().unwrap().iter().all(LocalStream::is_ended)
    }
}

#[async_trait]
impl CaptureSource for MockCaptureSource {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn acquire(&self, constraints: CaptureConstraints) -> Result<LocalStream, CaptureError> {
        if self.deny {
            return Err(CaptureError::Denied("permission dismissed".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tracks = constraints
            .kinds()
            .into_iter()
            .map(|kind| LocalTrack::new(format!("{kind}-{n}"), kind, format!("mock-{kind}")))
            .collect();
        let stream = LocalStream::new(format!("mock-stream-{n}"), tracks);
        self.issued.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}
