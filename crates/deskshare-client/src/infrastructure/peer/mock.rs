//! Mock peer-connection backend for unit and integration tests.
//!
//! The real backend needs UDP sockets, a DTLS handshake and a remote peer.
//! `MockPeerConnector` hands out [`MockPeerLink`]s that record every call in
//! a `Mutex<Vec<PeerCall>>` and return canned SDP strings, so tests can
//! assert on the exact negotiation sequence.
//!
//! # Behaviour switches
//!
//! - `failing_offers()` – every `create_offer` returns an error.
//! - `failing_connect()` – `connect` itself fails.
//! - `emitting_candidates()` – each `set_local_description` posts one
//!   `LocalCandidate` through the connection's event sink, the way a real
//!   ICE agent starts gathering once a local description exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deskshare_core::{IceCandidate, IceConfig, LocalTrack, OfferOptions, RemoteTrack, TrackKind};

use crate::application::events::PeerEvent;
use crate::application::peer_manager::{
    NegotiationError, PeerConnector, PeerEventSink, PeerLink, SdpKind,
};

/// One recorded call on a [`MockPeerLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCall {
    AddTrack(String),
    CreateOffer(OfferOptions),
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(IceCandidate),
    Close,
}

/// A recording stand-in for one peer connection.
pub struct MockPeerLink {
    generation: u64,
    sink: PeerEventSink,
    calls: Mutex<Vec<PeerCall>>,
    closed: AtomicBool,
    fail_offers: bool,
    emit_candidates: bool,
}

impl MockPeerLink {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tracks_added(&self) -> usize {
        self.count(|c| matches!(c, PeerCall::AddTrack(_)))
    }

    pub fn candidates_added(&self) -> usize {
        self.count(|c| matches!(c, PeerCall::AddCandidate(_)))
    }

    pub fn offers_created(&self) -> usize {
        self.count(|c| matches!(c, PeerCall::CreateOffer(_)))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Posts `event` as if this connection's observers raised it.
    pub fn emit(&self, event: PeerEvent) {
        self.sink.emit(event);
    }

    /// Simulates remote media arriving on this connection.
    pub fn emit_remote_track(&self, kind: TrackKind) {
        self.emit(PeerEvent::RemoteTrack(RemoteTrack {
            stream_id: format!("remote-{}", self.generation),
            track_id: format!("remote-{kind}-{}", self.generation),
            kind,
        }));
    }

    fn count(&self, pred: impl Fn(&PeerCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerLink for MockPeerLink {
    async fn add_track(&self, _stream_id: &str, track: &LocalTrack) -> Result<(), NegotiationError> {
        self.record(PeerCall::AddTrack(track.id.clone()));
        Ok(())
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<String, NegotiationError> {
        self.record(PeerCall::CreateOffer(options));
        if self.fail_offers {
            return Err(NegotiationError::Backend("mock offer failure".into()));
        }
        Ok(format!("mock-offer-{}-{}", self.generation, self.offers_created()))
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        self.record(PeerCall::CreateAnswer);
        Ok(format!("mock-answer-{}", self.generation))
    }

    async fn set_local_description(
        &self,
        kind: SdpKind,
        _sdp: &str,
    ) -> Result<(), NegotiationError> {
        self.record(PeerCall::SetLocal(kind));
        if self.emit_candidates {
            self.sink.emit(PeerEvent::LocalCandidate(IceCandidate {
                sdp_mline_index: Some(0),
                sdp_mid: Some("0".into()),
                candidate: format!(
                    "candidate:{} 1 udp 2122260223 192.0.2.{} 50000 typ host",
                    self.generation, self.generation
                ),
            }));
        }
        Ok(())
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        _sdp: &str,
    ) -> Result<(), NegotiationError> {
        self.record(PeerCall::SetRemote(kind));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError> {
        self.record(PeerCall::AddCandidate(candidate.clone()));
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.record(PeerCall::Close);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`MockPeerLink`]s and keeps every one it created.
#[derive(Default)]
pub struct MockPeerConnector {
    links: Mutex<Vec<Arc<MockPeerLink>>>,
    /// ICE configs passed to `connect`, in order.
    pub ice_configs: Mutex<Vec<IceConfig>>,
    fail_connect: bool,
    fail_offers: bool,
    emit_candidates: bool,
}

impl MockPeerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    pub fn failing_offers() -> Self {
        Self {
            fail_offers: true,
            ..Self::default()
        }
    }

    pub fn emitting_candidates() -> Self {
        Self {
            emit_candidates: true,
            ..Self::default()
        }
    }

    pub fn connections_created(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// The link created with `generation`, if any.
    pub fn link(&self, generation: u64) -> Option<Arc<MockPeerLink>> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.generation == generation)
            .cloned()
    }

    /// The most recently created link.
    pub fn latest(&self) -> Option<Arc<MockPeerLink>> {
        self.links.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PeerConnector for MockPeerConnector {
    async fn connect(
        &self,
        ice: &IceConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerLink>, NegotiationError> {
        if self.fail_connect {
            return Err(NegotiationError::Backend("mock connect failure".into()));
        }
        self.ice_configs.lock().unwrap().push(ice.clone());
        let link = Arc::new(MockPeerLink {
            generation: events.generation(),
            sink: events,
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            fail_offers: self.fail_offers,
            emit_candidates: self.emit_candidates,
        });
        self.links.lock().unwrap().push(Arc::clone(&link));
        Ok(link as Arc<dyn PeerLink>)
    }
}
