//! Domain entities for DeskShare.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of a clean architecture is the **domain**.  Domain
//! code has no imports from network libraries, async runtimes, or media
//! stacks, so it compiles and tests anywhere.  Outer layers (the client's
//! application and infrastructure modules) depend on it; it never depends on
//! them.
//!
//! For DeskShare the core domain concept is the session lifecycle: which
//! room/call state the client is in and which side effects each signaling
//! event is allowed to trigger.

pub mod config;
pub mod media;

/// Session lifecycle: states, membership events, and the transition table.
///
/// See [`session::transition`] for the main entry point.
pub mod session;
