//! # ember-settings
//!
//! Layered configuration for the Ember daemon.
//!
//! Settings come from three layers (later wins):
//! 1. **Compiled defaults** — [`EmberSettings::default()`]
//! 2. **Config file** — `ember.json`, deep-merged over defaults
//! 3. **Environment variables** — `EMBER_*` overrides
//!
//! There is no global singleton: the binary loads one [`EmberSettings`]
//! value and hands it to each component it constructs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
