//! High-level API for component version control.
//!
//! A [`Scope`] is one collection of components: its object store and ref
//! table, the working area where component files are edited, and the lane,
//! tag and sync machinery acting on them. This is the entry point for
//! applications embedding cvc.
//!
//! ```no_run
//! # async fn demo() -> cvc_sdk::SdkResult<()> {
//! use cvc_sdk::{ComponentId, Scope, ScopeConfig, TagParams};
//!
//! let mut scope = Scope::in_memory(ScopeConfig::default())?;
//! let button = ComponentId::parse("ui/button")?;
//! scope.add(button.clone(), [("index.ts".to_string(), b"export {}".to_vec())].into())?;
//! let results = scope.tag(&TagParams::default()).await?;
//! assert_eq!(results.tagged[0].label, "0.0.1");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod scope;
pub mod summary;
pub mod telemetry;

pub use config::{BuildConfig, LogConfig, ScopeConfig};
pub use error::{ErrorKind, SdkError, SdkResult};
pub use scope::Scope;
pub use summary::{
    CheckoutFailure, ComponentListing, HistoryMaterialization, ShownVersion, VersionSummary,
};

// Re-export the types callers need to drive a scope.
pub use cvc_lanes::{ChangeType, LaneDiff, LaneState, MergeReport, MergeStrategy};
pub use cvc_model::{HistoryEntry, LaneHistory, LaneOperation, ReleaseType, SemVer, Version};
pub use cvc_refs::Head;
pub use cvc_snap::{
    BatchOptions, BuildOptions, BuildPipeline, BuildResult, ComponentState, ComponentStatus,
    DependencyResolver, SnapParams, StaticResolver, TagParams, TagResults, TaskResult, Workspace,
};
pub use cvc_sources::FileMap;
pub use cvc_sync::{
    ExportRequest, ExportResult, ImportRequest, ImportResult, ImportStatus, InMemoryRemote,
    RemoteScope,
};
pub use cvc_types::{ComponentId, LaneId, ObjectId};
