use cvc_graph::GraphError;
use cvc_model::ModelError;
use cvc_refs::RefError;
use cvc_sources::SourceError;
use cvc_store::StoreError;
use cvc_types::{ComponentId, LaneId, TypeError};

/// Errors from lane operations.
#[derive(Debug, thiserror::Error)]
pub enum LaneError {
    #[error("lane not found: {0}")]
    NotFound(String),

    #[error("lane {0} already exists")]
    AlreadyExists(LaneId),

    #[error("unable to restore lane: an active lane with this id already exists")]
    RestoreConflict(LaneId),

    #[error("lane {0} is the active lane; switch away or use force to remove it")]
    ActiveLane(LaneId),

    #[error("lane {lane} has no history entry {entry}")]
    HistoryEntryNotFound { lane: LaneId, entry: String },

    #[error("merge conflict in {component}: {}", files.join(", "))]
    Conflict {
        component: ComponentId,
        files: Vec<String>,
    },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Refs(#[from] RefError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl LaneError {
    /// Returns `true` if a ref swap lost a race; the caller may retry.
    pub fn is_concurrent_modification(&self) -> bool {
        match self {
            Self::Refs(RefError::ConcurrentModification { .. }) => true,
            Self::Source(e) => e.is_concurrent_modification(),
            _ => false,
        }
    }
}

/// Result alias for lane operations.
pub type LaneResult<T> = Result<T, LaneError>;
