//! Tag and snap engine.
//!
//! [`TagEngine`] turns working-area changes into new versions. A tag gives
//! each selected component a semver version on main; a snap records an
//! untagged version, identified by its hash, on main or the active lane.
//! Dependents of what changed are versioned along with it, dependencies are
//! resolved through a [`DependencyResolver`], and an optional
//! [`BuildPipeline`] gates what gets persisted.
//!
//! Every run persists through one staged commit. The ref swaps at its end
//! are conditioned on the heads observed at the start, so a run that raced
//! another writer fails with [`SnapError::ConcurrentModification`] and
//! changes nothing visible.

pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod results;
pub mod workspace;

pub use config::SnapConfig;
pub use engine::TagEngine;
pub use error::{SnapError, SnapResult};
pub use params::{validate_options, BatchOptions, ReleaseBump, SnapParams, TagParams};
pub use pipeline::{
    BuildOptions, BuildPipeline, BuildResult, DependencyResolver, StaticResolver, TaskResult,
};
pub use results::{
    AutoTagged, ComponentState, ComponentStatus, FailedComponent, TagResults, TaggedComponent,
};
pub use workspace::{SoftTag, Workspace, WorkspaceComponent};
