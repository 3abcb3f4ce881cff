//! PeerConnectionManager: owns the one peer connection of a session.
//!
//! # Responsibilities
//!
//! - Create the connection on demand (idempotent) with the configured ICE
//!   servers, and wire its observers to the controller's queue.
//! - Attach the local capture tracks, at most once per connection.
//! - Produce offers, answer remote offers, apply remote answers.
//! - Apply remote ICE candidates, queuing any that arrive before the remote
//!   description so they are not rejected by the ICE agent.
//! - Close the connection (idempotent).
//!
//! # Generations
//!
//! Each connection object gets a new *generation* number.  Its observers tag
//! every event with that number, and the controller discards events whose
//! generation is no longer current.  This is what stops a late candidate
//! from a connection closed by `bye` from leaking into the next call.
//!
//! The WebRTC stack is behind [`PeerConnector`] (creates connections) and
//! [`PeerLink`] (one live connection), so this module is fully testable with
//! the mock backend.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use deskshare_core::{
    IceCandidate, IceConfig, LocalStream, LocalTrack, OfferOptions, ProtocolError, RoundCounter,
    SessionState, SignalingMessage,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::events::{EventSender, PeerEvent, SessionEvent};

/// Remote candidates held per connection while no remote description is set.
pub const MAX_PENDING_CANDIDATES: usize = 64;

/// Error type for peer-connection operations.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The operation needs a connection and there is none.
    #[error("no peer connection")]
    NoConnection,

    /// Offers are only created in `joined_conn`.
    #[error("cannot create an offer in state {0}")]
    WrongState(SessionState),

    /// The relay-server configuration was rejected before use.
    #[error(transparent)]
    InvalidIce(#[from] ProtocolError),

    /// The WebRTC stack reported an error.
    #[error("peer connection error: {0}")]
    Backend(String),
}

/// Which half of an offer/answer exchange a description is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpKind::Offer => f.write_str("offer"),
            SdpKind::Answer => f.write_str("answer"),
        }
    }
}

/// Where a connection's observers post their events.
///
/// Cloned into every observer closure of one connection.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    generation: u64,
    tx: EventSender,
}

impl PeerEventSink {
    pub fn new(generation: u64, tx: EventSender) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Posts `event`.  Silently dropped if the controller has stopped.
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.tx.send(SessionEvent::Peer {
            generation: self.generation,
            event,
        });
    }
}

/// Creates peer connections.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Builds a new connection bound to `ice`, whose observers report through
    /// `events`.
    async fn connect(
        &self,
        ice: &IceConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerLink>, NegotiationError>;
}

/// One live peer connection.
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn add_track(&self, stream_id: &str, track: &LocalTrack) -> Result<(), NegotiationError>;

    /// Creates an offer SDP requesting the media in `options`.
    async fn create_offer(&self, options: OfferOptions) -> Result<String, NegotiationError>;

    /// Creates an answer SDP for the current remote offer.
    async fn create_answer(&self) -> Result<String, NegotiationError>;

    async fn set_local_description(&self, kind: SdpKind, sdp: &str)
        -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

/// What became of a remote negotiation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Applied; this reply must be sent back (the answer to an offer).
    Reply(SignalingMessage),
    /// Applied; nothing to send.
    Applied,
    /// A candidate held until the remote description is set.
    Queued,
    /// Discarded (no connection, or an answer to a superseded offer).
    Dropped,
}

struct ActivePeer {
    generation: u64,
    link: Arc<dyn PeerLink>,
    tracks_attached: bool,
    has_remote_description: bool,
    pending_candidates: Vec<IceCandidate>,
}

/// Owns the session's peer connection.
pub struct PeerConnectionManager {
    connector: Arc<dyn PeerConnector>,
    ice: IceConfig,
    offer_options: OfferOptions,
    events: EventSender,
    generations: RoundCounter,
    rounds: RoundCounter,
    active: Option<ActivePeer>,
}

impl PeerConnectionManager {
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        ice: IceConfig,
        offer_options: OfferOptions,
        events: EventSender,
    ) -> Self {
        Self {
            connector,
            ice,
            offer_options,
            events,
            generations: RoundCounter::new(),
            rounds: RoundCounter::new(),
            active: None,
        }
    }

    pub fn has_connection(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the live connection, if any.
    pub fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    /// Returns `true` if `generation` names the live connection.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == Some(generation)
    }

    /// Number of remote candidates waiting for a remote description.
    pub fn pending_candidates(&self) -> usize {
        self.active
            .as_ref()
            .map_or(0, |a| a.pending_candidates.len())
    }

    /// Creates the connection unless one exists.  Returns `true` if a new
    /// one was created.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::InvalidIce`] if the relay configuration fails
    /// validation, or the backend's error if construction fails.
    pub async fn create_connection(&mut self) -> Result<bool, NegotiationError> {
        if self.active.is_some() {
            debug!("peer connection already exists; reusing");
            return Ok(false);
        }
        self.ice.validate()?;

        let generation = self.generations.next();
        let sink = PeerEventSink::new(generation, self.events.clone());
        let link = self.connector.connect(&self.ice, sink).await?;
        info!("peer connection created (generation {generation})");

        self.active = Some(ActivePeer {
            generation,
            link,
            tracks_attached: false,
            has_remote_description: false,
            pending_candidates: Vec::new(),
        });
        Ok(true)
    }

    /// Adds every track of `stream` to the live connection.
    ///
    /// Missing connection or stream is logged and ignored.  Returns the
    /// number of tracks added; 0 if they were already attached.
    pub async fn attach_local_tracks(&mut self, stream: Option<&LocalStream>) -> usize {
        let Some(active) = self.active.as_mut() else {
            error!("cannot attach local tracks: no peer connection");
            return 0;
        };
        let Some(stream) = stream else {
            error!("cannot attach local tracks: no local stream");
            return 0;
        };
        if active.tracks_attached {
            debug!("local tracks already attached to generation {}", active.generation);
            return 0;
        }

        let mut added = 0;
        for track in &stream.tracks {
            match active.link.add_track(&stream.id, track).await {
                Ok(()) => added += 1,
                Err(e) => error!("failed to add {} track {}: {e}", track.kind, track.id),
            }
        }
        active.tracks_attached = true;
        debug!(
            "attached {added} local track(s) to generation {}",
            active.generation
        );
        added
    }

    /// Creates an offer, sets it as the local description, and returns the
    /// message to send.  Only valid in `joined_conn`.
    pub async fn initiate_offer(
        &mut self,
        state: SessionState,
    ) -> Result<SignalingMessage, NegotiationError> {
        if state != SessionState::JoinedConn {
            return Err(NegotiationError::WrongState(state));
        }
        let active = self.active.as_ref().ok_or(NegotiationError::NoConnection)?;

        let sdp = active.link.create_offer(self.offer_options).await?;
        active
            .link
            .set_local_description(SdpKind::Offer, &sdp)
            .await?;
        let round = self.rounds.next();
        info!("offer created (round {round}, generation {})", active.generation);
        Ok(SignalingMessage::offer(sdp, round))
    }

    /// Applies a negotiation message from the remote peer.
    pub async fn handle_remote_message(
        &mut self,
        msg: SignalingMessage,
    ) -> Result<RemoteOutcome, NegotiationError> {
        let kind = msg.kind();
        let Some(active) = self.active.as_mut() else {
            warn!("dropping remote {kind}: no peer connection");
            return Ok(RemoteOutcome::Dropped);
        };

        match msg {
            SignalingMessage::Offer { sdp, round } => {
                active
                    .link
                    .set_remote_description(SdpKind::Offer, &sdp)
                    .await?;
                active.has_remote_description = true;
                Self::flush_pending(active).await;

                let answer = active.link.create_answer().await?;
                active
                    .link
                    .set_local_description(SdpKind::Answer, &answer)
                    .await?;
                info!("answer created for round {round:?}");
                Ok(RemoteOutcome::Reply(SignalingMessage::answer(answer, round)))
            }

            SignalingMessage::Answer { sdp, round } => {
                let latest = self.rounds.current();
                if let Some(round) = round {
                    if round != latest {
                        warn!("dropping answer for round {round}; latest offer is round {latest}");
                        return Ok(RemoteOutcome::Dropped);
                    }
                }
                active
                    .link
                    .set_remote_description(SdpKind::Answer, &sdp)
                    .await?;
                active.has_remote_description = true;
                Self::flush_pending(active).await;
                Ok(RemoteOutcome::Applied)
            }

            SignalingMessage::Candidate(candidate) => {
                if !active.has_remote_description {
                    if active.pending_candidates.len() >= MAX_PENDING_CANDIDATES {
                        warn!(
                            "dropping remote candidate: {MAX_PENDING_CANDIDATES} already queued \
                             without a remote description"
                        );
                        return Ok(RemoteOutcome::Dropped);
                    }
                    debug!("queuing remote candidate until remote description is set");
                    active.pending_candidates.push(candidate);
                    return Ok(RemoteOutcome::Queued);
                }
                active.link.add_ice_candidate(&candidate).await?;
                Ok(RemoteOutcome::Applied)
            }
        }
    }

    async fn flush_pending(active: &mut ActivePeer) {
        let pending = std::mem::take(&mut active.pending_candidates);
        if pending.is_empty() {
            return;
        }
        debug!("applying {} queued remote candidate(s)", pending.len());
        for candidate in &pending {
            if let Err(e) = active.link.add_ice_candidate(candidate).await {
                warn!("queued remote candidate rejected: {e}");
            }
        }
    }

    /// Closes and forgets the connection.  Returns `true` if one was open.
    pub async fn close(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        if let Err(e) = active.link.close().await {
            warn!("error closing peer connection (generation {}): {e}", active.generation);
        }
        info!("peer connection closed (generation {})", active.generation);
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
