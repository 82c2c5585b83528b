//! # ember-runtime
//!
//! The orchestration layer.
//!
//! - **Orchestrator**: subscribes to every inbound event kind, drives the
//!   generation pipeline, and executes the extracted directives
//! - **Safety gate**: evaluates the command-approval policy per invocation
//! - **Executor**: bash command execution with a hard timeout
//! - **Git workspace**: CLI wrapper + the conflict-resolution workflow
//! - **Collaborators**: [`collaborators::BrowserDriver`] and
//!   [`collaborators::RecallStore`] seams for the external browser and
//!   vector-similarity services
//! - **Prompts**: role personas and system-prompt composition
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on every other ember library crate;
//! depended on by the `ember-agent` binary.

#![deny(unsafe_code)]

pub mod collaborators;
pub mod conflicts;
pub mod errors;
pub mod executor;
pub mod git;
pub mod orchestrator;
pub mod prompts;

pub use collaborators::{BrowserDriver, BrowserOutcome, DisabledBrowser, NoRecall, RecallStore};
pub use errors::RuntimeError;
pub use orchestrator::{GenerationRequest, Orchestrator, OrchestratorConfig};
