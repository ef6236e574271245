use std::path::PathBuf;

use cvc_graph::GraphError;
use cvc_lanes::LaneError;
use cvc_model::ModelError;
use cvc_refs::RefError;
use cvc_snap::SnapError;
use cvc_sources::SourceError;
use cvc_store::StoreError;
use cvc_sync::SyncError;
use cvc_types::{ComponentId, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid configuration{}: {message}", located(path))]
    Config { path: Option<PathBuf>, message: String },

    #[error("component not tracked in the working area: {0}")]
    NotTracked(ComponentId),

    #[error("working area file is unreadable: {0}")]
    Workspace(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Type(#[from] TypeError),

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
    Snap(#[from] SnapError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Coarse classification of every failure a scope can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    /// Stored or received bytes do not hash to their id.
    CorruptObject,
    /// A head moved underneath the operation; nothing was changed and the
    /// operation may be retried.
    ConcurrentModification,
    RestoreConflict,
    BuildFailed,
    Validation,
    NothingToTag,
    AlreadyExists,
    Conflict,
    Io,
    Other,
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Validation,
            Self::NotTracked(_) => ErrorKind::NotFound,
            Self::Workspace(_) => ErrorKind::Other,
            Self::Io(_) => ErrorKind::Io,
            Self::Type(_) => ErrorKind::Validation,
            Self::Store(e) => store_kind(e),
            Self::Refs(e) => refs_kind(e),
            Self::Model(e) => model_kind(e),
            Self::Graph(e) => graph_kind(e),
            Self::Source(e) => source_kind(e),
            Self::Lane(e) => lane_kind(e),
            Self::Snap(e) => snap_kind(e),
            Self::Sync(e) => sync_kind(e),
        }
    }

    pub fn is_concurrent_modification(&self) -> bool {
        self.kind() == ErrorKind::ConcurrentModification
    }
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::CorruptObject { .. } => ErrorKind::CorruptObject,
        StoreError::Io(_) => ErrorKind::Io,
        StoreError::Serialization(_) | StoreError::NullObjectId => ErrorKind::Other,
    }
}

fn refs_kind(e: &RefError) -> ErrorKind {
    match e {
        RefError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
        RefError::InvalidRefName { .. } => ErrorKind::Validation,
        RefError::Io(_) => ErrorKind::Io,
        RefError::Serialization(_) => ErrorKind::Other,
    }
}

fn model_kind(e: &ModelError) -> ErrorKind {
    match e {
        ModelError::InvalidSemVer { .. }
        | ModelError::InvalidReleaseType(_)
        | ModelError::Type(_) => ErrorKind::Validation,
        ModelError::Store(e) => store_kind(e),
        ModelError::Hash(_) => ErrorKind::Other,
    }
}

fn graph_kind(e: &GraphError) -> ErrorKind {
    match e {
        GraphError::NotFound(_) | GraphError::MissingParent { .. } => ErrorKind::NotFound,
        GraphError::Store(e) => store_kind(e),
    }
}

fn source_kind(e: &SourceError) -> ErrorKind {
    match e {
        SourceError::ComponentNotFound(_) | SourceError::VersionNotFound { .. } => {
            ErrorKind::NotFound
        }
        SourceError::Store(e) => store_kind(e),
        SourceError::Refs(e) => refs_kind(e),
        SourceError::Model(e) => model_kind(e),
        SourceError::Graph(e) => graph_kind(e),
    }
}

fn lane_kind(e: &LaneError) -> ErrorKind {
    match e {
        LaneError::NotFound(_) | LaneError::HistoryEntryNotFound { .. } => ErrorKind::NotFound,
        LaneError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        LaneError::RestoreConflict(_) => ErrorKind::RestoreConflict,
        LaneError::ActiveLane(_) | LaneError::Type(_) => ErrorKind::Validation,
        LaneError::Conflict { .. } => ErrorKind::Conflict,
        LaneError::Source(e) => source_kind(e),
        LaneError::Graph(e) => graph_kind(e),
        LaneError::Store(e) => store_kind(e),
        LaneError::Refs(e) => refs_kind(e),
        LaneError::Model(e) => model_kind(e),
    }
}

fn snap_kind(e: &SnapError) -> ErrorKind {
    match e {
        SnapError::Validation(_) | SnapError::Type(_) => ErrorKind::Validation,
        SnapError::NothingToTag(_) => ErrorKind::NothingToTag,
        SnapError::BuildFailed(_) => ErrorKind::BuildFailed,
        SnapError::NotFound(_) => ErrorKind::NotFound,
        SnapError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
        SnapError::Model(e) => model_kind(e),
        SnapError::Store(e) => store_kind(e),
        SnapError::Graph(e) => graph_kind(e),
        SnapError::Lane(e) => lane_kind(e),
        SnapError::Source(e) => source_kind(e),
        SnapError::Refs(e) => refs_kind(e),
    }
}

fn sync_kind(e: &SyncError) -> ErrorKind {
    match e {
        SyncError::Validation(_) | SyncError::Type(_) => ErrorKind::Validation,
        SyncError::NotFound(_) | SyncError::MissingObject(_) => ErrorKind::NotFound,
        SyncError::RefRejected { .. } => ErrorKind::ConcurrentModification,
        SyncError::NotFastForward(_) => ErrorKind::Conflict,
        SyncError::Remote(_) => ErrorKind::Other,
        SyncError::Store(e) => store_kind(e),
        SyncError::Refs(e) => refs_kind(e),
        SyncError::Model(e) => model_kind(e),
        SyncError::Graph(e) => graph_kind(e),
        SyncError::Source(e) => source_kind(e),
        SyncError::Lane(e) => lane_kind(e),
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
