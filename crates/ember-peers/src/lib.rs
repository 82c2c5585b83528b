//! # ember-peers
//!
//! Peer coordination over a shared directory.
//!
//! Each node announces itself with one presence file, discovers other
//! nodes by scanning the same directory, and exchanges point-to-point
//! messages through a file mailbox (`{recipient}_{sender}_{id}.json`,
//! deleted on read — at-most-once delivery). Everything the service
//! learns is published onto the event fabric as peer join / leave /
//! message events.
//!
//! ## Crate Position
//!
//! Depends on ember-core (peer vocabulary) and ember-events (fabric).
//! The orchestrator consumes it for delegation delivery.

#![deny(unsafe_code)]

pub mod errors;
pub mod service;

pub use errors::PeerError;
pub use service::PeerCoordinator;
