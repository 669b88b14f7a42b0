//! Error types for the indexed store.

use conflux_channel::ChannelError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The identity projection produced no key for a value.
    #[error("identity projection produced no key in store {0}")]
    InvalidIdentity(String),

    /// An index projection produced no key for a value.
    #[error("index projection produced no key in {0}")]
    InvalidIndexKey(String),

    /// The store was closed before the operation.
    #[error("store closed")]
    Closed,

    /// Publishing an event failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
