//! SessionController: the screen-sharing session state machine.
//!
//! # How the controller works (for beginners)
//!
//! One client runs one session.  Everything that can happen to it arrives as
//! a [`SessionEvent`] on a single mpsc queue:
//!
//! ```text
//!   user (connect / leave) ──┐
//!   signaling channel ───────┼──► mpsc queue ──► SessionController::handle_event
//!   peer-connection observers┘
//! ```
//!
//! The controller pulls one event at a time and runs its handler to
//! completion (including every `.await` inside it) before looking at the next
//! one.  Because of that, a candidate discovered while an offer is being
//! created cannot overtake the offer on the wire: the candidate event simply
//! waits in the queue until the offer handler has sent the offer.
//!
//! Room-membership events are not interpreted here.  They go through the
//! pure [`transition`] table in `deskshare_core`, which returns the next
//! state and an [`Effect`].  This module only *executes* effects:
//!
//! | Effect             | What runs                                        |
//! |--------------------|--------------------------------------------------|
//! | `OpenPeer`         | create the peer connection, attach local tracks  |
//! | `OpenPeerAndOffer` | the above, then create and send an offer         |
//! | `ClosePeer`        | close the peer connection, clear remote preview  |
//! | `TearDown`         | close the peer, release capture, clear previews  |
//!
//! Failures of capture, signaling and negotiation are caught here, logged,
//! and (where the user must know) reported through the [`PresentationSink`].
//! None of them stops the controller.

use std::sync::Arc;

use deskshare_core::{
    transition, ClientFrame, Effect, MembershipEvent, RoundCounter, SessionConfig, SessionState,
    SignalingMessage,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::events::{
    EventReceiver, EventSender, PeerEvent, SessionEvent, SignalEvent, UserCommand,
};
use crate::application::media_capture::{CaptureSource, MediaCaptureController};
use crate::application::peer_manager::{PeerConnectionManager, PeerConnector, RemoteOutcome};
use crate::application::presentation::{Notice, PresentationSink};
use crate::application::signal_channel::{SignalChannel, SignalEventSink};

/// Cloneable handle for posting commands to a running controller.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: EventSender,
}

impl SessionHandle {
    /// Posts `event`.  Returns `false` if the controller has stopped.
    pub fn post(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn connect(&self) -> bool {
        self.post(SessionEvent::User(UserCommand::Connect))
    }

    pub fn leave(&self) -> bool {
        self.post(SessionEvent::User(UserCommand::Leave))
    }

    /// Asks the controller to leave (if needed) and stop.
    pub fn shutdown(&self) -> bool {
        self.post(SessionEvent::Shutdown)
    }
}

/// Owns the session: its state, capture stream and peer connection.
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    signal: Arc<dyn SignalChannel>,
    signal_generations: RoundCounter,
    capture: MediaCaptureController,
    peer: PeerConnectionManager,
    sink: Arc<dyn PresentationSink>,
    events: EventSender,
}

impl SessionController {
    /// Builds a controller and the queue it consumes.
    ///
    /// The receiver must be passed to [`run`](Self::run), or drained by hand
    /// through [`handle_event`](Self::handle_event) in tests.
    pub fn new(
        config: SessionConfig,
        signal: Arc<dyn SignalChannel>,
        connector: Arc<dyn PeerConnector>,
        capture_source: Arc<dyn CaptureSource>,
        sink: Arc<dyn PresentationSink>,
    ) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let peer = PeerConnectionManager::new(
            connector,
            config.ice.clone(),
            config.offer,
            events.clone(),
        );
        let controller = Self {
            config,
            state: SessionState::Init,
            signal,
            signal_generations: RoundCounter::new(),
            capture: MediaCaptureController::new(capture_source),
            peer,
            sink,
            events,
        };
        (controller, rx)
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.events.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn has_peer_connection(&self) -> bool {
        self.peer.has_connection()
    }

    pub fn has_local_stream(&self) -> bool {
        self.capture.is_holding()
    }

    pub fn peer_generation(&self) -> Option<u64> {
        self.peer.generation()
    }

    /// Generation of the latest signaling connection (0 before the first
    /// connect).  Only signal events tagged with it are acted on.
    pub fn signal_generation(&self) -> u64 {
        self.signal_generations.current()
    }

    /// Drains `rx` until a [`SessionEvent::Shutdown`] is handled.
    pub async fn run(mut self, mut rx: EventReceiver) {
        info!(
            "session controller started for room {}",
            self.config.room_id
        );
        while let Some(event) = rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        info!("session controller stopped");
    }

    /// Handles one event to completion.  Returns `false` once the controller
    /// should stop.
    pub async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::User(UserCommand::Connect) => self.on_connect().await,
            SessionEvent::User(UserCommand::Leave) => self.on_leave().await,
            SessionEvent::Signal { generation, event } => {
                if generation == self.signal_generations.current() {
                    self.on_signal(event).await;
                } else {
                    debug!(
                        "dropping {event:?} from stale signaling connection (generation {generation})"
                    );
                }
            }
            SessionEvent::Peer { generation, event } => self.on_peer(generation, event),
            SessionEvent::Shutdown => {
                self.on_leave().await;
                self.signal.disconnect().await;
                return false;
            }
        }
        true
    }

    // ── User commands ─────────────────────────────────────────────────────────

    async fn on_connect(&mut self) {
        if !self.state.can_connect() {
            warn!("connect ignored in state {}", self.state);
            return;
        }
        if self.state == SessionState::Leaved {
            self.set_state(SessionState::Init);
        }
        // Anything still queued from the previous connection is stale now.
        let generation = self.signal_generations.next();

        match self.capture.acquire(self.config.capture).await {
            Ok(stream) => self.sink.show_local_preview(stream),
            Err(e) => {
                error!("cannot start session: {e}");
                self.sink.notify(Notice::CaptureFailed(e.to_string()));
                return;
            }
        }

        if let Err(e) = self
            .signal
            .connect(
                &self.config.room_id,
                SignalEventSink::new(generation, self.events.clone()),
            )
            .await
        {
            error!("cannot reach signaling server: {e}");
            self.capture.release();
            self.sink.clear_local_preview();
            self.sink.notify(Notice::SignalingUnavailable(e.to_string()));
            return;
        }
        info!("joining room {}", self.config.room_id);
    }

    async fn on_leave(&mut self) {
        let in_room = self.state.is_in_room();
        if in_room {
            let frame = ClientFrame::Leave {
                room: self.config.room_id.clone(),
            };
            if let Err(e) = self.signal.send(frame) {
                warn!("could not send leave for room {}: {e}", self.config.room_id);
            }
        }
        self.apply(MembershipEvent::UserLeave).await;
        if !in_room {
            // Nobody will acknowledge a leave that was never sent.
            self.signal.disconnect().await;
        }
    }

    // ── Signaling events ──────────────────────────────────────────────────────

    async fn on_signal(&mut self, event: SignalEvent) {
        if let Some(room) = event.room() {
            if !room.is_empty() && room != self.config.room_id {
                debug!("ignoring frame for foreign room {room}");
                return;
            }
        }

        let membership = match event {
            SignalEvent::Message { data, .. } => {
                self.on_remote_message(data).await;
                return;
            }
            ref other => match other.membership() {
                Some(m) => m,
                None => return,
            },
        };

        if let SignalEvent::Disconnected { reason } = &event {
            warn!("signaling transport dropped: {reason}");
        }
        let applied = self.apply(membership).await;

        match event {
            SignalEvent::Full { .. } => {
                warn!("room {} is full", self.config.room_id);
                self.sink.notify(Notice::RoomFull {
                    room: self.config.room_id.clone(),
                });
                self.signal.disconnect().await;
            }
            SignalEvent::Leaved { .. } => self.signal.disconnect().await,
            SignalEvent::Disconnected { .. } if applied => self.sink.notify(Notice::Disconnected),
            _ => {}
        }
    }

    async fn on_remote_message(&mut self, data: Value) {
        let msg = match SignalingMessage::from_value(&data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("dropping invalid signaling message: {e}");
                return;
            }
        };
        let kind = msg.kind();

        if matches!(msg, SignalingMessage::Offer { .. })
            && self.state.is_in_room()
            && !self.peer.has_connection()
        {
            self.open_peer().await;
        }

        match self.peer.handle_remote_message(msg).await {
            Ok(RemoteOutcome::Reply(reply)) => self.send_message(reply),
            Ok(outcome) => debug!("remote {kind}: {outcome:?}"),
            Err(e) => error!("failed to apply remote {kind}: {e}"),
        }
    }

    // ── Peer-connection observer events ───────────────────────────────────────

    fn on_peer(&mut self, generation: u64, event: PeerEvent) {
        if !self.peer.is_current(generation) {
            debug!("dropping event from stale peer connection (generation {generation})");
            return;
        }
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if self.state.is_in_room() {
                    self.send_message(SignalingMessage::Candidate(candidate));
                } else {
                    debug!("local candidate discarded in state {}", self.state);
                }
            }
            PeerEvent::RemoteTrack(track) => self.sink.show_remote_track(&track),
            PeerEvent::StateChanged(status) => {
                info!("peer connection (generation {generation}) is {status:?}");
            }
        }
    }

    // ── State machine plumbing ────────────────────────────────────────────────

    /// Feeds `event` to the transition table and runs the effect.  Returns
    /// `false` if the event was ignored in the current state.
    async fn apply(&mut self, event: MembershipEvent) -> bool {
        let t = transition(self.state, event);
        if t.is_ignored() {
            debug!("ignoring {event:?} in state {}", self.state);
            return false;
        }
        self.set_state(t.to);
        self.run_effect(t.effect).await;
        true
    }

    fn set_state(&mut self, next: SessionState) {
        if next != self.state {
            info!(
                "room {}: {} -> {}",
                self.config.room_id, self.state, next
            );
        }
        self.state = next;
        self.sink.state_changed(next);
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Ignore => {}
            Effect::OpenPeer => {
                self.open_peer().await;
            }
            Effect::OpenPeerAndOffer => {
                if self.open_peer().await {
                    self.send_offer().await;
                }
            }
            Effect::ClosePeer => {
                self.peer.close().await;
                self.sink.clear_remote_preview();
            }
            Effect::TearDown => {
                self.peer.close().await;
                if self.capture.release() {
                    self.sink.clear_local_preview();
                }
                self.sink.clear_remote_preview();
            }
        }
    }

    /// Creates (or reuses) the peer connection and attaches the local
    /// tracks.  Returns `false` if no connection could be created.
    async fn open_peer(&mut self) -> bool {
        if let Err(e) = self.peer.create_connection().await {
            error!("failed to create peer connection: {e}");
            return false;
        }
        self.peer.attach_local_tracks(self.capture.stream()).await;
        true
    }

    async fn send_offer(&mut self) {
        match self.peer.initiate_offer(self.state).await {
            Ok(offer) => self.send_message(offer),
            Err(e) => error!("offer failed, staying in {}: {e}", self.state),
        }
    }

    fn send_message(&self, data: SignalingMessage) {
        let kind = data.kind();
        let frame = ClientFrame::Message {
            room: self.config.room_id.clone(),
            data,
        };
        if let Err(e) = self.signal.send(frame) {
            warn!("could not send {kind}: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::application::events::PeerStatus;
    use crate::application::presentation::MockPresentationSink;
    use crate::infrastructure::capture::mock::MockCaptureSource;
    use crate::infrastructure::peer::mock::{MockPeerConnector, PeerCall};
    use crate::infrastructure::signaling::mock::MockSignalChannel;
    use deskshare_core::{IceCandidate, MessageKind, RemoteTrack, TrackKind};
    use serde_json::json;

    const ROOM: &str = "r1";

    /// What the mocked presentation sink was told.
    #[derive(Default, Clone)]
    struct Seen {
        states: Arc<Mutex<Vec<SessionState>>>,
        notices: Arc<Mutex<Vec<Notice>>>,
        remote: Arc<Mutex<Vec<RemoteTrack>>>,
    }

    fn recording_sink(seen: &Seen) -> MockPresentationSink {
        let mut sink = MockPresentationSink::new();
        let states = Arc::clone(&seen.states);
        sink.expect_state_changed()
            .returning(move |s| states.lock().unwrap().push(s));
        let notices = Arc::clone(&seen.notices);
        sink.expect_notify()
            .returning(move |n| notices.lock().unwrap().push(n));
        let remote = Arc::clone(&seen.remote);
        sink.expect_show_remote_track()
            .returning(move |t| remote.lock().unwrap().push(t.clone()));
        sink.expect_show_local_preview().return_const(());
        sink.expect_clear_local_preview().return_const(());
        sink.expect_clear_remote_preview().return_const(());
        sink
    }

    struct Harness {
        controller: SessionController,
        rx: EventReceiver,
        signal: Arc<MockSignalChannel>,
        peers: Arc<MockPeerConnector>,
        capture: Arc<MockCaptureSource>,
        seen: Seen,
    }

    impl Harness {
        fn with(
            signal: MockSignalChannel,
            peers: MockPeerConnector,
            capture: MockCaptureSource,
        ) -> Self {
            let seen = Seen::default();
            Self::with_sink(signal, peers, capture, recording_sink(&seen), seen)
        }

        fn with_sink(
            signal: MockSignalChannel,
            peers: MockPeerConnector,
            capture: MockCaptureSource,
            sink: MockPresentationSink,
            seen: Seen,
        ) -> Self {
            let signal = Arc::new(signal);
            let peers = Arc::new(peers);
            let capture = Arc::new(capture);
            let config = SessionConfig::for_room(ROOM);
            let (controller, rx) = SessionController::new(
                config,
                Arc::clone(&signal) as Arc<dyn SignalChannel>,
                Arc::clone(&peers) as Arc<dyn PeerConnector>,
                Arc::clone(&capture) as Arc<dyn CaptureSource>,
                Arc::new(sink),
            );
            Self {
                controller,
                rx,
                signal,
                peers,
                capture,
                seen,
            }
        }

        fn new() -> Self {
            Self::with(
                MockSignalChannel::new(),
                MockPeerConnector::new(),
                MockCaptureSource::new(),
            )
        }

        /// Handles every queued event, including ones queued while handling.
        async fn pump(&mut self) {
            while let Ok(event) = self.rx.try_recv() {
                self.controller.handle_event(event).await;
            }
        }

        async fn user(&mut self, cmd: UserCommand) {
            self.controller.handle_event(SessionEvent::User(cmd)).await;
            self.pump().await;
        }

        async fn server(&mut self, event: SignalEvent) {
            let generation = self.controller.signal_generation();
            self.controller
                .handle_event(SessionEvent::Signal { generation, event })
                .await;
            self.pump().await;
        }

        async fn connect_and_join(&mut self) {
            self.user(UserCommand::Connect).await;
            self.server(joined()).await;
        }
    }

    fn joined() -> SignalEvent {
        SignalEvent::Joined {
            room: ROOM.into(),
            peer_id: "me".into(),
        }
    }

    fn other_join() -> SignalEvent {
        SignalEvent::OtherJoin {
            room: ROOM.into(),
            peer_id: "them".into(),
        }
    }

    fn bye() -> SignalEvent {
        SignalEvent::Bye {
            room: ROOM.into(),
            peer_id: "them".into(),
        }
    }

    fn relay(data: Value) -> SignalEvent {
        SignalEvent::Message {
            room: ROOM.into(),
            peer_id: "them".into(),
            data,
        }
    }

    #[tokio::test]
    async fn test_connect_acquires_capture_then_joins_room() {
        // Arrange
        let mut h = Harness::new();

        // Act
        h.user(UserCommand::Connect).await;

        // Assert
        assert_eq!(h.capture.acquire_count(), 1);
        assert_eq!(h.signal.connect_count(), 1);
        assert_eq!(
            h.signal.sent_frames(),
            vec![ClientFrame::Join { room: ROOM.into() }]
        );
        assert_eq!(h.controller.state(), SessionState::Init);
        assert!(!h.controller.has_peer_connection());
    }

    #[tokio::test]
    async fn test_denied_capture_stays_init_and_never_connects() {
        // Arrange
        let mut h = Harness::with(
            MockSignalChannel::new(),
            MockPeerConnector::new(),
            MockCaptureSource::denying(),
        );

        // Act
        h.user(UserCommand::Connect).await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Init);
        assert_eq!(h.signal.connect_count(), 0);
        let notices = h.seen.notices.lock().unwrap().clone();
        assert!(matches!(notices.as_slice(), [Notice::CaptureFailed(_)]));
    }

    #[tokio::test]
    async fn test_unreachable_server_releases_capture() {
        // Arrange
        let mut h = Harness::with(
            MockSignalChannel::unreachable(),
            MockPeerConnector::new(),
            MockCaptureSource::new(),
        );

        // Act
        h.user(UserCommand::Connect).await;

        // Assert
        assert!(!h.controller.has_local_stream());
        assert!(h.capture.all_released());
        let notices = h.seen.notices.lock().unwrap().clone();
        assert!(matches!(notices.as_slice(), [Notice::SignalingUnavailable(_)]));
    }

    #[tokio::test]
    async fn test_joined_creates_peer_and_attaches_tracks() {
        // Arrange
        let mut h = Harness::new();

        // Act
        h.connect_and_join().await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Joined);
        assert!(h.controller.has_peer_connection());
        let link = h.peers.latest().unwrap();
        assert_eq!(link.tracks_added(), 2);
        assert_eq!(link.offers_created(), 0);
    }

    #[tokio::test]
    async fn test_other_join_sends_exactly_one_offer_before_candidates() {
        // Arrange
        let mut h = Harness::with(
            MockSignalChannel::new(),
            MockPeerConnector::emitting_candidates(),
            MockCaptureSource::new(),
        );
        h.connect_and_join().await;

        // Act
        h.server(other_join()).await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::JoinedConn);
        let kinds = h.signal.sent_kinds();
        assert_eq!(kinds.first(), Some(&MessageKind::Offer));
        assert_eq!(
            kinds.iter().filter(|k| **k == MessageKind::Offer).count(),
            1
        );
        assert!(kinds[1..].iter().all(|k| *k == MessageKind::Candidate));
        assert!(kinds.len() >= 2, "the mock emits a candidate after set_local");
    }

    #[tokio::test]
    async fn test_other_join_in_joined_conn_renegotiates_on_same_connection() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.server(other_join()).await;
        let generation = h.controller.peer_generation();

        // Act
        h.server(other_join()).await;

        // Assert
        assert_eq!(h.controller.peer_generation(), generation);
        assert_eq!(h.peers.connections_created(), 1);
        let link = h.peers.latest().unwrap();
        assert_eq!(link.offers_created(), 2);
        assert_eq!(link.tracks_added(), 2);
        let rounds: Vec<_> = h.signal.sent_messages().iter().map(|m| m.round()).collect();
        assert_eq!(rounds, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_bye_then_other_join_builds_fresh_connection_with_tracks_once() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.server(other_join()).await;
        let first = h.peers.latest().unwrap();

        // Act
        h.server(bye()).await;
        assert_eq!(h.controller.state(), SessionState::JoinedUnbind);
        assert!(!h.controller.has_peer_connection());
        h.server(other_join()).await;

        // Assert
        assert!(first.is_closed());
        assert_eq!(h.controller.state(), SessionState::JoinedConn);
        assert_eq!(h.peers.connections_created(), 2);
        let second = h.peers.latest().unwrap();
        assert_ne!(first.generation(), second.generation());
        assert_eq!(second.tracks_added(), 2);
        assert_eq!(second.offers_created(), 1);
        assert!(h.controller.has_local_stream(), "bye keeps the capture");
    }

    #[tokio::test]
    async fn test_full_tears_everything_down_and_notifies() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        let link = h.peers.latest().unwrap();

        // Act
        h.server(SignalEvent::Full {
            room: ROOM.into(),
            peer_id: String::new(),
        })
        .await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Leaved);
        assert!(link.is_closed());
        assert!(!h.controller.has_peer_connection());
        assert!(h.capture.all_released());
        assert!(!h.signal.is_connected());
        let notices = h.seen.notices.lock().unwrap().clone();
        assert_eq!(notices, vec![Notice::RoomFull { room: ROOM.into() }]);
    }

    #[tokio::test]
    async fn test_full_before_joined_notifies_exactly_once() {
        // Arrange
        let seen = Seen::default();
        let mut sink = MockPresentationSink::new();
        sink.expect_notify()
            .withf(|n| matches!(n, Notice::RoomFull { .. }))
            .times(1)
            .return_const(());
        sink.expect_state_changed().return_const(());
        sink.expect_show_local_preview().return_const(());
        sink.expect_clear_local_preview().return_const(());
        sink.expect_clear_remote_preview().return_const(());
        let mut h = Harness::with_sink(
            MockSignalChannel::new(),
            MockPeerConnector::new(),
            MockCaptureSource::new(),
            sink,
            seen,
        );
        h.user(UserCommand::Connect).await;

        // Act
        h.server(SignalEvent::Full {
            room: ROOM.into(),
            peer_id: String::new(),
        })
        .await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Leaved);
        assert!(h.capture.all_released());
    }

    #[tokio::test]
    async fn test_user_leave_sends_leave_and_is_idempotent() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.server(other_join()).await;
        h.signal.clear_sent();

        // Act
        h.user(UserCommand::Leave).await;
        h.user(UserCommand::Leave).await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Leaved);
        assert_eq!(
            h.signal.sent_frames(),
            vec![ClientFrame::Leave { room: ROOM.into() }]
        );
        assert_eq!(h.peers.latest().unwrap().calls().last(), Some(&PeerCall::Close));
        assert!(h.capture.all_released());
    }

    #[tokio::test]
    async fn test_leaved_ack_closes_channel() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.user(UserCommand::Leave).await;
        assert!(h.signal.is_connected());

        // Act
        h.server(SignalEvent::Leaved {
            room: ROOM.into(),
            peer_id: "me".into(),
        })
        .await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Leaved);
        assert!(!h.signal.is_connected());
    }

    #[tokio::test]
    async fn test_transport_drop_is_implicit_leave() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;

        // Act
        h.server(SignalEvent::Disconnected {
            reason: "reset".into(),
        })
        .await;
        h.server(SignalEvent::Disconnected {
            reason: "again".into(),
        })
        .await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Leaved);
        assert!(!h.controller.has_peer_connection());
        assert!(h.capture.all_released());
        let notices = h.seen.notices.lock().unwrap().clone();
        assert_eq!(notices, vec![Notice::Disconnected]);
    }

    #[tokio::test]
    async fn test_reconnect_after_leave_starts_from_init() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.user(UserCommand::Leave).await;

        // Act
        h.user(UserCommand::Connect).await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Init);
        assert_eq!(h.capture.acquire_count(), 2);
        assert_eq!(h.signal.connect_count(), 2);
        let states = h.seen.states.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![SessionState::Joined, SessionState::Leaved, SessionState::Init]
        );
    }

    #[tokio::test]
    async fn test_late_leaved_ack_does_not_end_the_next_session() {
        // Arrange: leave, then reconnect before the server acknowledges.
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.user(UserCommand::Leave).await;
        let old = h.controller.signal_generation();
        h.user(UserCommand::Connect).await;
        assert_eq!(h.signal.connection_generation(), Some(old + 1));

        // Act
        h.controller
            .handle_event(SessionEvent::Signal {
                generation: old,
                event: SignalEvent::Leaved {
                    room: ROOM.into(),
                    peer_id: "me".into(),
                },
            })
            .await;
        h.controller
            .handle_event(SessionEvent::Signal {
                generation: old,
                event: SignalEvent::Disconnected {
                    reason: "old socket closed".into(),
                },
            })
            .await;
        h.pump().await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Init);
        assert!(h.controller.has_local_stream());
        assert!(h.signal.is_connected());
        assert_eq!(h.signal.disconnect_count(), 0);
        assert!(h.seen.notices.lock().unwrap().is_empty());

        // Act: the new connection's own join still lands.
        assert!(h.signal.deliver(joined()));
        h.pump().await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::Joined);
    }

    #[tokio::test]
    async fn test_connect_while_in_room_is_ignored() {
        let mut h = Harness::new();
        h.connect_and_join().await;

        h.user(UserCommand::Connect).await;

        assert_eq!(h.capture.acquire_count(), 1);
        assert_eq!(h.signal.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_offer_is_answered_with_same_round() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.signal.clear_sent();

        // Act
        h.server(relay(json!({"type": "offer", "sdp": "v=0 remote", "round": 7})))
            .await;

        // Assert
        let sent = h.signal.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), MessageKind::Answer);
        assert_eq!(sent[0].round(), Some(7));
        assert_eq!(h.controller.state(), SessionState::Joined);
    }

    #[tokio::test]
    async fn test_candidate_before_connection_is_dropped() {
        // Arrange
        let mut h = Harness::new();
        h.user(UserCommand::Connect).await;

        // Act
        h.server(relay(json!({
            "type": "candidate",
            "sdpMLineIndex": 0,
            "sdpMid": "0",
            "candidate": "candidate:1 1 udp 1 10.0.0.1 9 typ host"
        })))
        .await;

        // Assert
        assert_eq!(h.peers.connections_created(), 0);
        assert_eq!(h.controller.state(), SessionState::Init);
    }

    #[tokio::test]
    async fn test_invalid_message_is_dropped() {
        let mut h = Harness::new();
        h.connect_and_join().await;

        h.server(relay(json!({"type": "renegotiate"}))).await;
        h.server(relay(json!("not an object"))).await;

        assert_eq!(h.controller.state(), SessionState::Joined);
        assert_eq!(h.peers.latest().unwrap().calls().len(), 2, "only the two add_track calls");
    }

    #[tokio::test]
    async fn test_frames_for_other_rooms_are_ignored() {
        let mut h = Harness::new();
        h.user(UserCommand::Connect).await;

        h.server(SignalEvent::Joined {
            room: "elsewhere".into(),
            peer_id: "x".into(),
        })
        .await;

        assert_eq!(h.controller.state(), SessionState::Init);
    }

    #[tokio::test]
    async fn test_stale_generation_events_are_dropped() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        h.server(other_join()).await;
        let old = h.peers.latest().unwrap();
        h.server(bye()).await;
        h.server(other_join()).await;
        h.signal.clear_sent();

        // Act
        old.emit(PeerEvent::LocalCandidate(IceCandidate {
            sdp_mline_index: Some(0),
            sdp_mid: Some("0".into()),
            candidate: "candidate:stale".into(),
        }));
        old.emit_remote_track(TrackKind::Video);
        h.pump().await;

        // Assert
        assert!(h.signal.sent_frames().is_empty());
        assert!(h.seen.remote.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_track_reaches_presentation() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;
        let link = h.peers.latest().unwrap();

        // Act
        link.emit_remote_track(TrackKind::Video);
        link.emit(PeerEvent::StateChanged(PeerStatus::Connected));
        h.pump().await;

        // Assert
        let remote = h.seen.remote.lock().unwrap().clone();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].kind, TrackKind::Video);
    }

    #[tokio::test]
    async fn test_offer_failure_keeps_state_for_retry() {
        // Arrange
        let mut h = Harness::with(
            MockSignalChannel::new(),
            MockPeerConnector::failing_offers(),
            MockCaptureSource::new(),
        );
        h.connect_and_join().await;

        // Act
        h.server(other_join()).await;

        // Assert
        assert_eq!(h.controller.state(), SessionState::JoinedConn);
        assert!(h.signal.sent_messages().is_empty());
        assert!(h.controller.has_peer_connection());
    }

    #[tokio::test]
    async fn test_shutdown_leaves_room_and_stops() {
        // Arrange
        let mut h = Harness::new();
        h.connect_and_join().await;

        // Act
        let keep_running = h.controller.handle_event(SessionEvent::Shutdown).await;

        // Assert
        assert!(!keep_running);
        assert_eq!(h.controller.state(), SessionState::Leaved);
        assert!(!h.signal.is_connected());
        assert!(h
            .signal
            .sent_frames()
            .contains(&ClientFrame::Leave { room: ROOM.into() }));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_from_handle() {
        // Arrange
        let h = Harness::new();
        let handle = h.controller.handle();
        let task = tokio::spawn(h.controller.run(h.rx));

        // Act
        assert!(handle.connect());
        assert!(handle.shutdown());

        // Assert
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("controller must stop")
            .unwrap();
        assert!(!handle.leave(), "queue is closed once the controller stops");
    }
}
