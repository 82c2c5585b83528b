//! Settings errors.

use thiserror::Error;

/// Failure while loading or merging settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Config file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON or does not match the schema.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
