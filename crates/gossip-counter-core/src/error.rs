//! Error types for the gossip counter core.

use thiserror::Error;

/// Errors raised by core operations.
///
/// None of these is raised by the merge or increment paths themselves:
/// capacity exhaustion is handled by eviction, and reads are always defined.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A bounded map was configured with a capacity of zero.
    #[error("invalid capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("decoding error: {0}")]
    Decode(String),

    /// The payload decoded but violates a structural rule.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
