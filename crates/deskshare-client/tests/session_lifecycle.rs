//! Session lifecycle properties, exercised through the public controller API
//! with the recording mocks from `infrastructure::*::mock`.

use std::sync::Arc;

use deskshare_client::application::events::{
    EventReceiver, SessionEvent, SignalEvent, UserCommand,
};
use deskshare_client::application::media_capture::CaptureSource;
use deskshare_client::application::peer_manager::PeerConnector;
use deskshare_client::application::presentation::PresentationSink;
use deskshare_client::application::session_controller::SessionController;
use deskshare_client::application::signal_channel::SignalChannel;
use deskshare_client::infrastructure::capture::mock::MockCaptureSource;
use deskshare_client::infrastructure::peer::mock::MockPeerConnector;
use deskshare_client::infrastructure::presentation::TracingPresentation;
use deskshare_client::infrastructure::signaling::mock::MockSignalChannel;
use deskshare_core::{MessageKind, SessionConfig, SessionState};
use serde_json::json;

const ROOM: &str = "222222";

struct Client {
    controller: SessionController,
    rx: EventReceiver,
    signal: Arc<MockSignalChannel>,
    peers: Arc<MockPeerConnector>,
    capture: Arc<MockCaptureSource>,
    screen: Arc<TracingPresentation>,
}

impl Client {
    fn new(peers: MockPeerConnector) -> Self {
        let signal = Arc::new(MockSignalChannel::new());
        let peers = Arc::new(peers);
        let capture = Arc::new(MockCaptureSource::new());
        let screen = Arc::new(TracingPresentation::new());
        let (controller, rx) = SessionController::new(
            SessionConfig::for_room(ROOM),
            Arc::clone(&signal) as Arc<dyn SignalChannel>,
            Arc::clone(&peers) as Arc<dyn PeerConnector>,
            Arc::clone(&capture) as Arc<dyn CaptureSource>,
            Arc::clone(&screen) as Arc<dyn PresentationSink>,
        );
        Self {
            controller,
            rx,
            signal,
            peers,
            capture,
            screen,
        }
    }

    async fn handle(&mut self, event: SessionEvent) {
        self.controller.handle_event(event).await;
        while let Ok(queued) = self.rx.try_recv() {
            self.controller.handle_event(queued).await;
        }
    }

    async fn user(&mut self, cmd: UserCommand) {
        self.handle(SessionEvent::User(cmd)).await;
    }

    async fn server(&mut self, event: SignalEvent) {
        let generation = self.controller.signal_generation();
        self.handle(SessionEvent::Signal { generation, event }).await;
    }

    /// Peer-connection existence matches the state it is in.
    fn assert_peer_invariant(&self, context: &str) {
        let state = self.controller.state();
        if !state.is_in_room() {
            assert!(
                !self.controller.has_peer_connection(),
                "{context}: peer connection alive in {state}"
            );
        }
        if matches!(state, SessionState::Joined | SessionState::JoinedConn) {
            assert!(
                self.controller.has_peer_connection(),
                "{context}: no peer connection in {state}"
            );
        }
        let open = (1..=self.peers.connections_created() as u64)
            .filter_map(|g| self.peers.link(g))
            .filter(|l| !l.is_closed())
            .count();
        assert!(open <= 1, "{context}: {open} concurrent peer connections");
    }
}

fn membership_events() -> Vec<SignalEvent> {
    let ev = |name: &str| {
        let room = ROOM.to_string();
        let peer_id = "peer".to_string();
        match name {
            "joined" => SignalEvent::Joined { room, peer_id },
            "otherjoin" => SignalEvent::OtherJoin { room, peer_id },
            "full" => SignalEvent::Full { room, peer_id },
            "leaved" => SignalEvent::Leaved { room, peer_id },
            "bye" => SignalEvent::Bye { room, peer_id },
            _ => SignalEvent::Disconnected {
                reason: "test".into(),
            },
        }
    };
    ["joined", "otherjoin", "full", "leaved", "bye", "disconnect"]
        .into_iter()
        .map(ev)
        .collect()
}

#[tokio::test]
async fn test_peer_invariant_holds_for_every_three_event_sequence() {
    let events = membership_events();
    for a in &events {
        for b in &events {
            for c in &events {
                // Arrange
                let mut client = Client::new(MockPeerConnector::new());
                client.user(UserCommand::Connect).await;

                // Act / Assert after every step
                for (i, event) in [a, b, c].into_iter().enumerate() {
                    client.server(event.clone()).await;
                    client.assert_peer_invariant(&format!("{a:?} / {b:?} / {c:?} step {i}"));
                }
                client.user(UserCommand::Leave).await;
                client.assert_peer_invariant("after leave");
                assert!(client.capture.all_released());
            }
        }
    }
}

#[tokio::test]
async fn test_leave_is_idempotent() {
    // Arrange
    let mut client = Client::new(MockPeerConnector::new());
    client.user(UserCommand::Connect).await;
    client.server(membership_events()[0].clone()).await;

    // Act
    client.user(UserCommand::Leave).await;
    let after_first = client.signal.sent_frames();
    client.user(UserCommand::Leave).await;
    client.user(UserCommand::Leave).await;

    // Assert
    assert_eq!(client.controller.state(), SessionState::Leaved);
    assert_eq!(client.signal.sent_frames(), after_first);
    assert_eq!(client.capture.acquire_count(), 1);
    assert!(client.capture.all_released());
    assert_eq!(client.peers.connections_created(), 1);
}

#[tokio::test]
async fn test_offer_precedes_every_candidate() {
    // Arrange
    let mut client = Client::new(MockPeerConnector::emitting_candidates());
    client.user(UserCommand::Connect).await;
    client.server(membership_events()[0].clone()).await;

    // Act
    client.server(membership_events()[1].clone()).await;

    // Assert
    let kinds = client.signal.sent_kinds();
    assert_eq!(kinds[0], MessageKind::Offer);
    assert_eq!(kinds.iter().filter(|k| **k == MessageKind::Offer).count(), 1);
    assert!(kinds.contains(&MessageKind::Candidate));
}

#[tokio::test]
async fn test_full_from_every_state_releases_everything() {
    let full = membership_events()[2].clone();
    let prefixes: Vec<Vec<SignalEvent>> = vec![
        vec![],
        vec![membership_events()[0].clone()],
        vec![membership_events()[0].clone(), membership_events()[1].clone()],
        vec![
            membership_events()[0].clone(),
            membership_events()[1].clone(),
            membership_events()[4].clone(),
        ],
    ];

    for prefix in prefixes {
        // Arrange
        let mut client = Client::new(MockPeerConnector::new());
        client.user(UserCommand::Connect).await;
        for event in prefix {
            client.server(event).await;
        }

        // Act
        client.server(full.clone()).await;

        // Assert
        assert_eq!(client.controller.state(), SessionState::Leaved);
        assert!(!client.controller.has_peer_connection());
        assert!(!client.controller.has_local_stream());
        assert!(client.capture.all_released());
        let snap = client.screen.snapshot();
        assert!(snap.local_stream.is_none());
        assert!(snap.can_connect);
        assert_eq!(snap.last_notice.as_deref(), Some("room 222222 is full"));
    }
}

#[tokio::test]
async fn test_candidate_without_connection_is_dropped_quietly() {
    // Arrange
    let mut client = Client::new(MockPeerConnector::new());

    // Act
    client
        .server(SignalEvent::Message {
            room: ROOM.into(),
            peer_id: "peer".into(),
            data: json!({"type": "candidate", "label": 0, "id": "0", "candidate": "candidate:x"}),
        })
        .await;

    // Assert
    assert_eq!(client.controller.state(), SessionState::Init);
    assert_eq!(client.peers.connections_created(), 0);
    assert!(client.signal.sent_frames().is_empty());
}

#[tokio::test]
async fn test_two_clients_complete_offer_answer_through_mocks() {
    // Arrange: A is alone in the room, then B joins.
    let mut a = Client::new(MockPeerConnector::emitting_candidates());
    let mut b = Client::new(MockPeerConnector::emitting_candidates());
    a.user(UserCommand::Connect).await;
    b.user(UserCommand::Connect).await;
    a.server(membership_events()[0].clone()).await;
    b.server(membership_events()[0].clone()).await;
    a.signal.clear_sent();
    b.signal.clear_sent();

    // Act: relay A's output to B and B's output back to A.
    a.server(membership_events()[1].clone()).await;
    for msg in a.signal.sent_messages() {
        b.server(SignalEvent::Message {
            room: ROOM.into(),
            peer_id: "a".into(),
            data: serde_json::to_value(&msg).unwrap(),
        })
        .await;
    }
    for msg in b.signal.sent_messages() {
        a.server(SignalEvent::Message {
            room: ROOM.into(),
            peer_id: "b".into(),
            data: serde_json::to_value(&msg).unwrap(),
        })
        .await;
    }

    // Assert
    let b_sent = b.signal.sent_messages();
    let answers: Vec<_> = b_sent
        .iter()
        .filter(|m| m.kind() == MessageKind::Answer)
        .collect();
    assert_eq!(answers.len(), 1, "exactly one answer per offer");
    assert_eq!(answers[0].round(), a.signal.sent_messages()[0].round());
    let a_link = a.peers.latest().unwrap();
    let b_link = b.peers.latest().unwrap();
    assert!(a_link.candidates_added() >= 1);
    assert!(b_link.candidates_added() >= 1);
    assert_eq!(a.controller.state(), SessionState::JoinedConn);
    assert_eq!(b.controller.state(), SessionState::Joined);
}
