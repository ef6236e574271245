//! Error types for version graph operations.

use cvc_store::StoreError;
use cvc_types::ObjectId;

/// Errors that can occur while walking version history.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The starting version of a walk does not exist.
    #[error("version not found: {0}")]
    NotFound(ObjectId),

    /// History is broken: a version names a parent the store does not have.
    #[error("broken history: version {child} references missing parent {parent}")]
    MissingParent { child: ObjectId, parent: ObjectId },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for GraphError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
