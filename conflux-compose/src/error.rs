//! Error types for composition.

use conflux_channel::ChannelError;
use conflux_store::StoreError;
use thiserror::Error;

/// Result type for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur while composing fragments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// A fragment declares a composition key other than its aggregate's.
    #[error("fragment for key {actual} cannot join aggregate {expected}")]
    AggregateKeyMismatch { expected: String, actual: String },

    /// The engine was closed before the operation.
    #[error("composition engine closed")]
    Closed,

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
