use cvc_graph::GraphError;
use cvc_lanes::LaneError;
use cvc_model::ModelError;
use cvc_refs::RefError;
use cvc_sources::SourceError;
use cvc_store::StoreError;
use cvc_types::{ObjectId, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote error: {0}")]
    Remote(String),

    #[error("ref rejected: {name}: {reason}")]
    RefRejected { name: String, reason: String },

    #[error("not a fast-forward update for ref {0}")]
    NotFastForward(String),

    #[error("{0}")]
    Validation(String),

    #[error("not found on remote: {0}")]
    NotFound(String),

    #[error("object {0} is referenced but missing on the remote")]
    MissingObject(ObjectId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Refs(#[from] RefError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Lane(#[from] LaneError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl SyncError {
    /// Returns `true` if a local ref swap lost a race; the caller may retry.
    pub fn is_concurrent_modification(&self) -> bool {
        match self {
            Self::Refs(RefError::ConcurrentModification { .. }) => true,
            Self::Source(e) => e.is_concurrent_modification(),
            Self::Lane(e) => e.is_concurrent_modification(),
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
