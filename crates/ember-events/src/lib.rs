//! # ember-events
//!
//! The in-process nervous system:
//!
//! - **[`fabric::EventFabric`]**: publish/subscribe dispatcher over the
//!   closed [`ember_core::events::EmberEvent`] union. Fan-out is sequential
//!   on the publishing task; handler failures are isolated and logged.
//! - **[`sessions::SessionStore`]**: bounded per-conversation message
//!   history with transcript rendering for generation context.
//!
//! ## Crate Position
//!
//! Leaf infrastructure. Depends only on ember-core; everything that emits
//! or consumes events depends on this crate.

#![deny(unsafe_code)]

pub mod fabric;
pub mod sessions;

pub use fabric::{EventFabric, HandlerError};
pub use sessions::SessionStore;
