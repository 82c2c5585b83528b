//! Settings loading and layering.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::SettingsError;
use crate::types::EmberSettings;

/// Default config file name, relative to the working directory.
const SETTINGS_FILE: &str = "ember.json";

/// Resolve the settings file path: `EMBER_CONFIG` override or `ember.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    std::env::var("EMBER_CONFIG")
        .map_or_else(|_| PathBuf::from(SETTINGS_FILE), PathBuf::from)
}

/// Deep-merge `overlay` into `base`.
///
/// Objects merge key-by-key recursively; any other value in `overlay`
/// replaces the one in `base`.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with env overrides.
///
/// A missing file is not an error — defaults apply. A present-but-broken
/// file is an error so misconfiguration is not silently ignored.
pub fn load_settings() -> Result<EmberSettings, SettingsError> {
    let path = settings_path();
    if path.exists() {
        load_settings_from_path(&path)
    } else {
        debug!(?path, "no settings file, using defaults");
        let mut settings = EmberSettings::default();
        apply_env_overrides(&mut settings);
        Ok(settings)
    }
}

/// Load settings from a specific file, deep-merged over defaults, then
/// apply env overrides.
pub fn load_settings_from_path(path: &Path) -> Result<EmberSettings, SettingsError> {
    let raw = std::fs::read_to_string(path)?;
    let file_value: Value = serde_json::from_str(&raw)?;
    let default_value = serde_json::to_value(EmberSettings::default())?;
    let merged = deep_merge(default_value, file_value);
    let mut settings: EmberSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    debug!(?path, "settings loaded");
    Ok(settings)
}

/// Apply `EMBER_*` environment overrides (highest-priority layer).
fn apply_env_overrides(settings: &mut EmberSettings) {
    if let Ok(identity) = std::env::var("EMBER_IDENTITY") {
        settings.identity.identity = Some(identity);
    }
    if let Ok(role) = std::env::var("EMBER_ROLE") {
        settings.identity.role = role;
    }
    if let Ok(dir) = std::env::var("EMBER_PEER_DIR") {
        settings.peers.shared_dir = dir;
    }
    if let Ok(capacity) = std::env::var("EMBER_SESSION_CAPACITY") {
        match capacity.parse() {
            Ok(n) => settings.sessions.capacity = n,
            Err(_) => warn!(capacity, "ignoring non-numeric EMBER_SESSION_CAPACITY"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
