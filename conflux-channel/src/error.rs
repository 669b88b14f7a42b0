//! Error types for the event channel.

use thiserror::Error;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur in channel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// A subscriber did not keep up and its live buffer filled up.
    /// Terminal for that subscription only.
    #[error("subscriber overflowed its buffer of {capacity} events")]
    Overflow { capacity: usize },

    /// The channel was closed before the operation.
    #[error("channel closed")]
    Closed,
}
