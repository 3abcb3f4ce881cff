//! Peer-connection backends.
//!
//! - **`webrtc_backend`** – `WebRtcConnector` / `WebRtcLink`, built on the
//!   `webrtc` crate.  Used by the binary.
//! - **`mock`** – recording test doubles.

pub mod mock;
pub mod webrtc_backend;

pub use webrtc_backend::WebRtcConnector;
