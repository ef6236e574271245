use cvc_crypto::HasherError;
use cvc_store::StoreError;
use cvc_types::TypeError;

/// Errors from domain object operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid version '{input}': {reason}")]
    InvalidSemVer { input: String, reason: String },

    #[error("invalid release type '{0}'")]
    InvalidReleaseType(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HasherError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
