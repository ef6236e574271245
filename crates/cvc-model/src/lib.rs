//! Domain objects persisted by cvc.
//!
//! Each type here is an immutable record with a canonical JSON encoding and
//! a content hash derived from it:
//!
//! - [`Source`] -- raw bytes of one file
//! - [`Version`] -- a snapshot of a component: files, parents, dependencies
//! - [`Component`] -- the record behind a component ref: head, tags, sequence
//! - [`Lane`] -- per-component heads of a parallel history
//! - [`LaneHistory`] -- append-only log of lane mutations
//!
//! Mutation always means writing a new object; nothing here is updated in
//! place once stored.

pub mod component;
pub mod error;
pub mod history;
pub mod lane;
pub mod semver;
pub mod source;
pub mod version;

pub use component::Component;
pub use error::{ModelError, ModelResult};
pub use history::{HistoryEntry, LaneHistory, LaneOperation};
pub use lane::{Lane, LaneComponent};
pub use semver::{PreId, ReleaseType, SemVer};
pub use source::Source;
pub use version::{
    BuildStatus, ComponentDependency, DependencyLifecycle, DependencyPolicy, LogEntry, Version,
};
