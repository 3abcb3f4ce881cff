//! Session lifecycle: the room/call state machine.
//!
//! A DeskShare client walks through these states:
//!
//! ```text
//!            connect + "joined"        "otherjoin"
//!   Init ───────────────────────► Joined ──────────► JoinedConn
//!                                   │                 │    ▲
//!                                   │ "bye"     "bye" │    │ "otherjoin"
//!                                   ▼                 ▼    │
//!                                 JoinedUnbind ◄──────┘────┘
//!
//!   any state ── "full" | "leaved" | disconnect | user leave ──► Leaved
//! ```
//!
//! - `Init`: nothing acquired yet.
//! - `Joined`: the signaling server admitted us to the room; we are alone.
//! - `JoinedConn`: another member is present and a peer connection is being
//!   (or has been) negotiated with it.
//! - `JoinedUnbind`: the other member left; the peer connection is closed but
//!   we are still in the room waiting for someone new.
//! - `Leaved`: terminal for this attempt.  A new connect starts over at `Init`.
//!
//! The [`transition`] function is pure: it only decides the next state and
//! which side effect the controller must run.  It never touches a socket or a
//! peer connection itself, which makes the whole table testable here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle state of a screen-sharing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No room joined and nothing acquired.
    #[default]
    Init,
    /// In the room, alone.
    Joined,
    /// In the room with a remote member; negotiating or connected.
    JoinedConn,
    /// In the room; the remote member left and its connection was torn down.
    JoinedUnbind,
    /// Left the room (or was rejected from it).
    Leaved,
}

impl SessionState {
    /// Every state, in declaration order.  Handy for exhaustive tests.
    pub const ALL: [SessionState; 5] = [
        SessionState::Init,
        SessionState::Joined,
        SessionState::JoinedConn,
        SessionState::JoinedUnbind,
        SessionState::Leaved,
    ];

    /// Returns the wire/log name of the state (`"joined_conn"`, …).
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::Joined => "joined",
            SessionState::JoinedConn => "joined_conn",
            SessionState::JoinedUnbind => "joined_unbind",
            SessionState::Leaved => "leaved",
        }
    }

    /// Returns `true` while the client holds a room membership.
    ///
    /// A peer connection may only exist in these states.
    pub fn is_in_room(self) -> bool {
        matches!(
            self,
            SessionState::Joined | SessionState::JoinedConn | SessionState::JoinedUnbind
        )
    }

    /// Whether a user "connect" action is accepted in this state.
    pub fn can_connect(self) -> bool {
        matches!(self, SessionState::Init | SessionState::Leaved)
    }

    /// Whether a user "leave" action has anything to do in this state.
    pub fn can_leave(self) -> bool {
        !self.can_connect()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room-membership events that drive the state machine.
///
/// All but `UserLeave` originate from the signaling channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipEvent {
    /// The server admitted us to the room.
    Joined,
    /// Another member entered the room.
    OtherJoin,
    /// The room is at capacity; our join was rejected.
    Full,
    /// The server acknowledged our leave request.
    Leaved,
    /// The other member left the room.
    Bye,
    /// The signaling transport dropped.
    Disconnected,
    /// The local user pressed "leave".
    UserLeave,
}

impl MembershipEvent {
    pub const ALL: [MembershipEvent; 7] = [
        MembershipEvent::Joined,
        MembershipEvent::OtherJoin,
        MembershipEvent::Full,
        MembershipEvent::Leaved,
        MembershipEvent::Bye,
        MembershipEvent::Disconnected,
        MembershipEvent::UserLeave,
    ];
}

/// Side effect the controller must run after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The event has no meaning in the current state; nothing changes.
    Ignore,
    /// Create the peer connection if none exists and attach local tracks.
    OpenPeer,
    /// Create (or reuse) the peer connection, then send an offer.
    OpenPeerAndOffer,
    /// Close the peer connection; room membership and capture are kept.
    ClosePeer,
    /// Close the peer connection and release the capture stream.
    TearDown,
}

/// Result of feeding one [`MembershipEvent`] to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub effect: Effect,
}

impl Transition {
    fn stay(state: SessionState) -> Self {
        Self {
            from: state,
            to: state,
            effect: Effect::Ignore,
        }
    }

    fn go(from: SessionState, to: SessionState, effect: Effect) -> Self {
        Self { from, to, effect }
    }

    /// Returns `true` when the event was ignored.
    pub fn is_ignored(&self) -> bool {
        self.effect == Effect::Ignore
    }
}

/// Computes the next state and side effect for `event` arriving in `state`.
///
/// Leaving is idempotent: `Full`, `Leaved` and `Disconnected` always end in
/// [`SessionState::Leaved`], and a second `UserLeave` is ignored.
///
/// # Examples
///
/// ```rust
/// use deskshare_core::{transition, Effect, MembershipEvent, SessionState};
///
/// let t = transition(SessionState::Joined, MembershipEvent::OtherJoin);
/// assert_eq!(t.to, SessionState::JoinedConn);
/// assert_eq!(t.effect, Effect::OpenPeerAndOffer);
/// ```
pub fn transition(state: SessionState, event: MembershipEvent) -> Transition {
    use MembershipEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Init, E::Joined) => Transition::go(state, S::Joined, Effect::OpenPeer),
        (_, E::Joined) => Transition::stay(state),

        (S::Joined | S::JoinedConn | S::JoinedUnbind, E::OtherJoin) => {
            Transition::go(state, S::JoinedConn, Effect::OpenPeerAndOffer)
        }
        (S::Init | S::Leaved, E::OtherJoin) => Transition::stay(state),

        (S::Joined | S::JoinedConn, E::Bye) => {
            Transition::go(state, S::JoinedUnbind, Effect::ClosePeer)
        }
        (S::Init | S::JoinedUnbind | S::Leaved, E::Bye) => Transition::stay(state),

        (_, E::Full) | (_, E::Leaved) => Transition::go(state, S::Leaved, Effect::TearDown),

        (S::Leaved, E::Disconnected | E::UserLeave) => Transition::stay(state),
        (_, E::Disconnected | E::UserLeave) => {
            Transition::go(state, S::Leaved, Effect::TearDown)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
