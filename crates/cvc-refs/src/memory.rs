//! In-memory reference store for testing and ephemeral use.

use std::sync::RwLock;

use cvc_types::ObjectId;
use tracing::debug;

use crate::error::Result;
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::{Head, RefTable, RefUpdate};

/// An in-memory implementation of [`RefStore`].
///
/// The whole table sits behind one `RwLock`, so a batch of updates is checked
/// and applied under a single write guard.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    table: RwLock<RefTable>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store with HEAD on main.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current table.
    pub fn snapshot(&self) -> RefTable {
        self.table.read().expect("lock poisoned").clone()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let table = self.table.read().expect("lock poisoned");
        Ok(table.refs.get(name).copied())
    }

    fn update_refs(&self, updates: &[RefUpdate]) -> Result<()> {
        for update in updates {
            validate_ref_name(&update.name)?;
        }
        let mut table = self.table.write().expect("lock poisoned");
        table.apply(updates)?;
        debug!(count = updates.len(), "refs updated");
        Ok(())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let table = self.table.read().expect("lock poisoned");
        Ok(table.list(prefix))
    }

    fn head(&self) -> Result<Head> {
        Ok(self.table.read().expect("lock poisoned").head.clone())
    }

    fn set_head(&self, head: &Head) -> Result<()> {
        let mut table = self.table.write().expect("lock poisoned");
        table.head = head.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RefError;
    use cvc_types::LaneId;
    use std::sync::Arc;
    use std::thread;

    fn id(tag: &[u8]) -> ObjectId {
        ObjectId::from_bytes(tag)
    }

    // -----------------------------------------------------------------------
    // Basic CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn read_nonexistent_returns_none() {
        let store = InMemoryRefStore::new();
        assert!(store.read_ref("refs/components/nope").unwrap().is_none());
    }

    #[test]
    fn create_then_swap() {
        let store = InMemoryRefStore::new();
        let name = "refs/components/ui/button";
        store.update_ref(RefUpdate::create(name, id(b"c1"))).unwrap();
        store
            .update_ref(RefUpdate::swap(name, Some(id(b"c1")), id(b"c2")))
            .unwrap();
        assert_eq!(store.read_ref(name).unwrap(), Some(id(b"c2")));
    }

    #[test]
    fn stale_expectation_is_concurrent_modification() {
        let store = InMemoryRefStore::new();
        let name = "refs/components/ui/button";
        store.update_ref(RefUpdate::create(name, id(b"c1"))).unwrap();
        store
            .update_ref(RefUpdate::swap(name, Some(id(b"c1")), id(b"c2")))
            .unwrap();
        let err = store
            .update_ref(RefUpdate::swap(name, Some(id(b"c1")), id(b"c3")))
            .unwrap_err();
        assert!(matches!(err, RefError::ConcurrentModification { .. }));
        assert_eq!(store.read_ref(name).unwrap(), Some(id(b"c2")));
    }

    #[test]
    fn invalid_name_rejected_before_apply() {
        let store = InMemoryRefStore::new();
        let err = store
            .update_refs(&[
                RefUpdate::create("refs/ok", id(b"1")),
                RefUpdate::create("bad name", id(b"2")),
            ])
            .unwrap_err();
        assert!(matches!(err, RefError::InvalidRefName { .. }));
        assert!(store.read_ref("refs/ok").unwrap().is_none());
    }

    #[test]
    fn head_defaults_to_main() {
        let store = InMemoryRefStore::new();
        assert_eq!(store.head().unwrap(), Head::Main);
        let lane = Head::Lane(LaneId::new("stage").unwrap());
        store.set_head(&lane).unwrap();
        assert_eq!(store.head().unwrap(), lane);
    }

    #[test]
    fn component_and_lane_listing() {
        let store = InMemoryRefStore::new();
        store
            .update_refs(&[
                RefUpdate::create("refs/components/a", id(b"a")),
                RefUpdate::create("refs/lanes/stage", id(b"l")),
                RefUpdate::create("refs/lane-history/stage", id(b"h")),
            ])
            .unwrap();
        assert_eq!(store.component_refs().unwrap().len(), 1);
        assert_eq!(store.lane_refs().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Racing writers
    // -----------------------------------------------------------------------

    #[test]
    fn only_one_racing_swap_wins() {
        let store = Arc::new(InMemoryRefStore::new());
        let name = "refs/components/ui/button";
        store.update_ref(RefUpdate::create(name, id(b"base"))).unwrap();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .update_ref(RefUpdate::swap(name, Some(id(b"base")), id(&[i])))
                        .is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }
}
