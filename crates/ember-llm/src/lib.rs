//! # ember-llm
//!
//! Generation providers and the failover client.
//!
//! - **[`provider::Provider`]**: async trait every provider implements
//!   (generate, embed, configuration check)
//! - **[`failover::FailoverClient`]**: tries providers in ranked order,
//!   records usage on success, aggregates failures on exhaustion
//! - **[`ranking`]**: total order over providers from a configured
//!   priority list
//! - **[`pricing`]**: per-million-token cost tables
//! - **[`anthropic`] / [`openai`]**: concrete non-streaming HTTP providers
//!
//! ## Crate Position
//!
//! Depends on ember-core (usage vocabulary) and ember-events (usage
//! reports are published straight onto the fabric).

#![deny(unsafe_code)]

pub mod anthropic;
pub mod failover;
pub mod ledger;
pub mod openai;
pub mod pricing;
pub mod provider;
pub mod ranking;

pub use failover::FailoverClient;
pub use provider::{Completion, Provider, ProviderDescriptor, ProviderError, ProviderResult};
pub use ranking::rank_providers;
