//! Version history of components.
//!
//! A component's versions form a DAG through their parent links: one parent
//! for a normal snap or tag, two for a merge, none for the first version.
//! [`VersionGraph`] walks that DAG straight out of the object store.
//!
//! All walks are iterative with visited sets. A parent that is missing from
//! the store is an error ([`GraphError::MissingParent`]), never silently
//! treated as the end of history.

pub mod error;
pub mod graph;

pub use error::{GraphError, GraphResult};
pub use graph::{Divergence, VersionGraph};
