use cvc_graph::GraphError;
use cvc_lanes::LaneError;
use cvc_model::ModelError;
use cvc_refs::RefError;
use cvc_sources::SourceError;
use cvc_store::StoreError;
use cvc_types::TypeError;

/// Errors from tag and snap operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    /// Invalid options or a request that breaks a tagging rule.
    #[error("{0}")]
    Validation(String),

    /// No component qualified for the operation.
    #[error("{0}")]
    NothingToTag(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    /// A component or dependency version could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A head moved between the start of the operation and its commit.
    /// Nothing was updated; the caller may retry.
    #[error("concurrent modification of {target}; retry the operation")]
    ConcurrentModification { target: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Lane(#[from] LaneError),

    #[error(transparent)]
    Source(SourceError),

    #[error(transparent)]
    Refs(RefError),
}

impl SnapError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_concurrent_modification(&self) -> bool {
        match self {
            Self::ConcurrentModification { .. } => true,
            Self::Lane(e) => e.is_concurrent_modification(),
            _ => false,
        }
    }
}

impl From<RefError> for SnapError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::ConcurrentModification { name, .. } => {
                Self::ConcurrentModification { target: name }
            }
            other => Self::Refs(other),
        }
    }
}

impl From<SourceError> for SnapError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Refs(refs) => refs.into(),
            other => Self::Source(other),
        }
    }
}

/// Result alias for tag and snap operations.
pub type SnapResult<T> = Result<T, SnapError>;
