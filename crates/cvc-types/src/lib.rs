//! Foundation types for component version control (cvc).
//!
//! Every other cvc crate depends on `cvc-types`. The types here carry no
//! storage or graph semantics; they only name things.
//!
//! # Key Types
//!
//! - [`ObjectId`] - Content-addressed identifier (BLAKE3 hash)
//! - [`ComponentId`] - Logical component identity: `(scope?, namespace, name)`
//! - [`LaneId`] - Scope-qualified lane name
//! - [`Timestamp`] - Wall-clock milliseconds used in version and lane logs

pub mod error;
pub mod identity;
pub mod object;
pub mod temporal;

pub use error::TypeError;
pub use identity::{ComponentId, LaneId, MAIN_LANE};
pub use object::ObjectId;
pub use temporal::Timestamp;
