//! Runtime errors.

use thiserror::Error;

/// Failures inside the orchestration layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A git CLI invocation failed.
    #[error("git error: {message}")]
    Git {
        /// stderr or spawn failure detail.
        message: String,
    },

    /// The browser collaborator refused or failed an action.
    #[error("browser error: {message}")]
    Browser {
        /// Details.
        message: String,
    },

    /// The recall collaborator failed.
    #[error("recall error: {message}")]
    Recall {
        /// Details.
        message: String,
    },

    /// Workspace file I/O failed.
    #[error("workspace I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
