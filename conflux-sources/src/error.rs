//! Error types for fragment sources.

use conflux_channel::ChannelError;
use thiserror::Error;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while turning source data into fragments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The resource lacks the label carrying its composition key.
    #[error("resource {resource} has no label {label}")]
    MissingLabel { resource: String, label: String },

    /// A value could not be decoded.
    #[error("failed to decode {key} of resource {resource}: {reason}")]
    Decode {
        resource: String,
        key: String,
        reason: String,
    },

    /// The source data cannot describe a fragment.
    #[error("invalid source data: {0}")]
    Invalid(String),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
