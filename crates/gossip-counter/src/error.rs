//! Error types for pods.

use gossip_counter_core::CoreError;
use gossip_counter_sync::SyncError;
use thiserror::Error;

use crate::pod::PodState;

/// Errors that can occur during pod operations.
#[derive(Debug, Error)]
pub enum PodError {
    /// Store or codec error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Transport or gossip error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The pod no longer accepts increments.
    #[error("pod is not accepting increments (state: {state})")]
    NotAccepting { state: PodState },

    /// Configuration rejected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for pod operations.
pub type Result<T> = std::result::Result<T, PodError>;
