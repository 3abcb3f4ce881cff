//! Signaling channel implementations.
//!
//! - **`websocket`** – `WsSignalChannel`: JSON text frames over a WebSocket.
//! - **`mock`** – a recording channel that tests drive by hand.

pub mod mock;
pub mod websocket;

pub use websocket::WsSignalChannel;
