use cvc_graph::GraphError;
use cvc_model::ModelError;
use cvc_refs::RefError;
use cvc_store::StoreError;
use cvc_types::ComponentId;

/// Errors from the source repository.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("component not found: {0}")]
    ComponentNotFound(ComponentId),

    #[error("version '{label}' of {component} not found")]
    VersionNotFound { component: ComponentId, label: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Refs(#[from] RefError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl SourceError {
    /// Returns `true` if a ref swap lost a race; the caller may retry.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::Refs(RefError::ConcurrentModification { .. }))
    }
}

/// Result alias for source repository operations.
pub type SourceResult<T> = Result<T, SourceError>;
