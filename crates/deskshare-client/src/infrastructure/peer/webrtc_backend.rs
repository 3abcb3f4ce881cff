//! Peer-connection backend built on the `webrtc` crate.
//!
//! # How a connection is built
//!
//! 1. A `MediaEngine` with the default codecs (VP8/VP9/H.264, Opus) and the
//!    default interceptors (NACK, RTCP reports, TWCC) makes one `API` object,
//!    shared by every connection this connector creates.
//! 2. Each [`PeerConnector::connect`] call builds an `RTCPeerConnection`
//!    with the configured ICE servers and installs three observers: local
//!    ICE candidates, remote tracks, and connection-state changes.  All
//!    three post [`PeerEvent`]s through the connection's [`PeerEventSink`].
//! 3. Local capture tracks become `TrackLocalStaticSample`s (VP8 for video,
//!    Opus for audio).  Feeding encoded samples into them belongs to the
//!    capture pipeline.
//!
//! Offers always ask to receive audio and video when requested, by adding a
//! `recvonly` transceiver for any kind that has no transceiver yet.

use std::sync::Arc;

use async_trait::async_trait;
use deskshare_core::{IceCandidate, IceConfig, LocalTrack, OfferOptions, RemoteTrack, TrackKind};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::application::events::{PeerEvent, PeerStatus};
use crate::application::peer_manager::{
    NegotiationError, PeerConnector, PeerEventSink, PeerLink, SdpKind,
};

fn backend(err: webrtc::Error) -> NegotiationError {
    NegotiationError::Backend(err.to_string())
}

fn rtc_config(ice: &IceConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice
            .servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn status_of(state: RTCPeerConnectionState) -> PeerStatus {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => PeerStatus::New,
        RTCPeerConnectionState::Connecting => PeerStatus::Connecting,
        RTCPeerConnectionState::Connected => PeerStatus::Connected,
        RTCPeerConnectionState::Disconnected => PeerStatus::Disconnected,
        RTCPeerConnectionState::Failed => PeerStatus::Failed,
        RTCPeerConnectionState::Closed => PeerStatus::Closed,
    }
}

fn codec_type(kind: TrackKind) -> RTPCodecType {
    match kind {
        TrackKind::Audio => RTPCodecType::Audio,
        TrackKind::Video => RTPCodecType::Video,
    }
}

/// Builds `webrtc` peer connections.
pub struct WebRtcConnector {
    api: API,
}

impl WebRtcConnector {
    /// Registers the default codecs and interceptors.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::Backend`] if codec or interceptor registration
    /// fails.
    pub fn new() -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(backend)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(backend)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api })
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        ice: &IceConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerLink>, NegotiationError> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(rtc_config(ice))
                .await
                .map_err(backend)?,
        );
        let generation = events.generation();

        let sink = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let sink = sink.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("ICE gathering complete (generation {})", sink.generation());
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => sink.emit(PeerEvent::LocalCandidate(IceCandidate {
                        sdp_mline_index: init.sdp_mline_index,
                        sdp_mid: init.sdp_mid,
                        candidate: init.candidate,
                    })),
                    Err(e) => warn!("failed to serialize local candidate: {e}"),
                }
            })
        }));

        let sink = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let kind = match track.kind() {
                    RTPCodecType::Audio => Some(TrackKind::Audio),
                    RTPCodecType::Video => Some(TrackKind::Video),
                    RTPCodecType::Unspecified => None,
                };
                if let Some(kind) = kind {
                    sink.emit(PeerEvent::RemoteTrack(RemoteTrack {
                        stream_id: track.stream_id(),
                        track_id: track.id(),
                        kind,
                    }));
                }
                Box::pin(async {})
            },
        ));

        let sink = events;
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            sink.emit(PeerEvent::StateChanged(status_of(state)));
            Box::pin(async {})
        }));

        info!("webrtc peer connection built (generation {generation})");
        Ok(Arc::new(WebRtcLink { pc }) as Arc<dyn PeerLink>)
    }
}

/// One `RTCPeerConnection`.
pub struct WebRtcLink {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcLink {
    async fn ensure_receiving(&self, kind: RTPCodecType) -> Result<(), NegotiationError> {
        let transceivers = self.pc.get_transceivers().await;
        if transceivers.iter().any(|t| t.kind() == kind) {
            return Ok(());
        }
        self.pc
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    fn description(kind: SdpKind, sdp: &str) -> Result<RTCSessionDescription, NegotiationError> {
        match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp.to_owned()),
            SdpKind::Answer => RTCSessionDescription::answer(sdp.to_owned()),
        }
        .map_err(backend)
    }
}

#[async_trait]
impl PeerLink for WebRtcLink {
    async fn add_track(&self, stream_id: &str, track: &LocalTrack) -> Result<(), NegotiationError> {
        let mime_type = match track.kind {
            TrackKind::Video => MIME_TYPE_VP8,
            TrackKind::Audio => MIME_TYPE_OPUS,
        };
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            track.id.clone(),
            stream_id.to_owned(),
        ));
        let sender = self
            .pc
            .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(backend)?;

        // Drain RTCP so the interceptors keep running.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        debug!("added {} track {} (codec {mime_type})", track.kind, track.id);
        Ok(())
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<String, NegotiationError> {
        if options.receive_video {
            self.ensure_receiving(codec_type(TrackKind::Video)).await?;
        }
        if options.receive_audio {
            self.ensure_receiving(codec_type(TrackKind::Audio)).await?;
        }
        let offer = self.pc.create_offer(None).await.map_err(backend)?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        let answer = self.pc.create_answer(None).await.map_err(backend)?;
        Ok(answer.sdp)
    }

    async fn set_local_description(
        &self,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_local_description(Self::description(kind, sdp)?)
            .await
            .map_err(backend)
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_remote_description(Self::description(kind, sdp)?)
            .await
            .map_err(backend)
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate.clone(),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: None,
            })
            .await
            .map_err(backend)
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.pc.close().await.map_err(backend)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
