//! Peer coordination errors.

use thiserror::Error;

/// Failure in the peer coordination service.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Shared-directory I/O failed.
    #[error("peer storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("failed to encode peer record: {0}")]
    Encode(#[from] serde_json::Error),
}
