//! Head pointers for cvc.
//!
//! Objects are immutable, so everything that "changes" in cvc is a ref: a
//! named pointer from a logical id to the object currently representing it.
//!
//! - `refs/components/<namespace>/<name>` -- current component record
//! - `refs/lanes/<lane>` -- current lane state
//! - `refs/lane-history/<lane>` -- current lane history log
//! - `HEAD` -- the active lane, or main
//!
//! Refs are only ever changed through [`RefStore::update_refs`], which applies
//! a batch of compare-and-swap updates atomically: either every expected value
//! matches and all updates land, or nothing changes.

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::{component_ref, lane_history_ref, lane_ref, validate_ref_name};
pub use traits::RefStore;
pub use types::{Head, RefTable, RefUpdate};
