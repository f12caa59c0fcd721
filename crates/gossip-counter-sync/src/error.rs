//! Error types for the sync module.

use gossip_counter_core::CoreError;
use thiserror::Error;

/// Errors that can occur during gossip operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Payload encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// No seed could be contacted.
    #[error("join failed: {0}")]
    JoinFailed(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The addressed peer is unknown to the transport.
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    /// The local transport has been shut down.
    #[error("transport not running: {0}")]
    NotRunning(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
