//! Error types for application identifiers.

use thiserror::Error;

/// Result type for application operations.
pub type AppsResult<T> = Result<T, AppsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppsError {
    /// An identifier was parsed from a blank string.
    #[error("{kind} must not be blank")]
    BlankId { kind: &'static str },
}
