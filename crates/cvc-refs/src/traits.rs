//! The [`RefStore`] trait defining the reference storage interface.

use cvc_types::ObjectId;

use crate::error::Result;
use crate::names::{COMPONENTS_PREFIX, LANES_PREFIX};
use crate::types::{Head, RefUpdate};

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`) and apply each
/// `update_refs` batch atomically with respect to every other call.
pub trait RefStore: Send + Sync {
    /// Read a ref by its canonical name.
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Apply a batch of compare-and-swap updates atomically.
    ///
    /// Fails with `ConcurrentModification` naming the first stale ref and
    /// leaves every ref untouched.
    fn update_refs(&self, updates: &[RefUpdate]) -> Result<()>;

    /// List all refs whose canonical name starts with `prefix`, sorted.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>>;

    /// The active lane, or main.
    fn head(&self) -> Result<Head>;

    /// Set the active lane.
    fn set_head(&self, head: &Head) -> Result<()>;

    /// Apply a single compare-and-swap update.
    fn update_ref(&self, update: RefUpdate) -> Result<()> {
        self.update_refs(std::slice::from_ref(&update))
    }

    /// All component refs.
    fn component_refs(&self) -> Result<Vec<(String, ObjectId)>> {
        self.list_refs(COMPONENTS_PREFIX)
    }

    /// All lane refs.
    fn lane_refs(&self) -> Result<Vec<(String, ObjectId)>> {
        self.list_refs(LANES_PREFIX)
    }
}
