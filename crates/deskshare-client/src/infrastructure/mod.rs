//! Infrastructure layer for the screen-sharing client.
//!
//! Contains the adapters behind the application-layer traits: the WebSocket
//! signaling channel, the WebRTC peer backend, display capture, the
//! log-backed presentation sink, and config file storage.  Each adapter
//! module also carries a recording `mock` for tests.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `deskshare_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.

pub mod capture;
pub mod peer;
pub mod presentation;
pub mod signaling;
pub mod storage;
