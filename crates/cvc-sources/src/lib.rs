//! The source repository: where component records and versions are created.
//!
//! [`SourceRepository`] finds or creates components by identity, turns file
//! contents into [`Source`](cvc_model::Source) objects and candidate
//! [`Version`](cvc_model::Version)s, and persists them through a
//! [`StagedCommit`]: every object is written first and the component ref is
//! swapped last, so a version is never reachable without its component
//! record agreeing.

pub mod error;
pub mod repository;
pub mod staged;

pub use error::{SourceError, SourceResult};
pub use repository::{AddSourceResult, FileMap, SourceInput, SourceRepository};
pub use staged::StagedCommit;
