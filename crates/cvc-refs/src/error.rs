//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// A compare-and-swap found a different value than expected.
    ///
    /// Nothing in the batch was applied.
    #[error("concurrent modification of {name}: expected {expected}, found {actual}")]
    ConcurrentModification {
        name: String,
        expected: String,
        actual: String,
    },

    /// The ref name is malformed.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidRefName { name: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
