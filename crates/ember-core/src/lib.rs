//! # ember-core
//!
//! Foundation types and shared vocabulary for the Ember coordination daemon.
//!
//! - **Events**: [`events::EmberEvent`] closed tagged union with
//!   [`events::EventKind`] discriminants for subscription keying
//! - **Messages**: [`messages::Message`] conversation entries with
//!   [`messages::Role`] roles
//! - **Peers**: [`peers::PeerRecord`] presence records and
//!   [`peers::MailboxMessage`] point-to-point envelopes
//! - **Usage**: [`usage::CallUsage`] and [`usage::LedgerSnapshot`] token/cost
//!   accounting payloads
//! - **Safety**: [`safety::SafetyPolicy`] command-approval rules
//! - **Text**: [`text::excerpt`] UTF-8-safe log excerpts
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other ember crates.

#![deny(unsafe_code)]

pub mod events;
pub mod messages;
pub mod peers;
pub mod safety;
pub mod text;
pub mod usage;
