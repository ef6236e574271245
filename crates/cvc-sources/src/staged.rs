use std::collections::HashSet;

use cvc_refs::{RefStore, RefUpdate};
use cvc_store::{ObjectStore, StoredObject};
use cvc_types::ObjectId;
use tracing::debug;

use crate::error::SourceResult;

/// Objects to write and refs to swap, applied in that order.
///
/// If the ref batch is rejected the written objects stay behind as
/// unreferenced orphans; nothing visible changes.
#[derive(Debug, Default)]
pub struct StagedCommit {
    objects: Vec<StoredObject>,
    staged_ids: HashSet<ObjectId>,
    updates: Vec<RefUpdate>,
}

impl StagedCommit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an object and return the id it will be stored under.
    pub fn stage(&mut self, object: StoredObject) -> ObjectId {
        let id = object.compute_id();
        if self.staged_ids.insert(id) {
            self.objects.push(object);
        }
        id
    }

    /// Stage a ref update for the final swap.
    pub fn update_ref(&mut self, update: RefUpdate) {
        self.updates.push(update);
    }

    pub fn objects(&self) -> &[StoredObject] {
        &self.objects
    }

    pub fn updates(&self) -> &[RefUpdate] {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.updates.is_empty()
    }

    /// Write every staged object, then apply the ref updates atomically.
    pub fn commit(
        self,
        objects: &dyn ObjectStore,
        refs: &dyn RefStore,
    ) -> SourceResult<Vec<ObjectId>> {
        let ids = objects.write_batch(&self.objects)?;
        if !self.updates.is_empty() {
            refs.update_refs(&self.updates)?;
        }
        debug!(objects = ids.len(), refs = self.updates.len(), "staged commit applied");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvc_refs::InMemoryRefStore;
    use cvc_store::{InMemoryObjectStore, ObjectKind};

    fn obj(data: &[u8]) -> StoredObject {
        StoredObject::new(ObjectKind::Source, data.to_vec())
    }

    #[test]
    fn objects_written_then_refs_swapped() {
        let store = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let mut staged = StagedCommit::new();
        let id = staged.stage(obj(b"a"));
        staged.update_ref(RefUpdate::create("refs/components/a", id));
        staged.commit(&store, &refs).unwrap();
        assert!(store.exists(&id).unwrap());
        assert_eq!(refs.read_ref("refs/components/a").unwrap(), Some(id));
    }

    #[test]
    fn duplicate_stage_is_deduplicated() {
        let mut staged = StagedCommit::new();
        let a = staged.stage(obj(b"same"));
        let b = staged.stage(obj(b"same"));
        assert_eq!(a, b);
        assert_eq!(staged.objects().len(), 1);
    }

    #[test]
    fn rejected_swap_leaves_refs_untouched() {
        let store = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        refs.update_ref(RefUpdate::create("refs/components/a", ObjectId::from_bytes(b"current")))
            .unwrap();

        let mut staged = StagedCommit::new();
        let id = staged.stage(obj(b"new"));
        staged.update_ref(RefUpdate::swap(
            "refs/components/a",
            Some(ObjectId::from_bytes(b"stale")),
            id,
        ));
        let err = staged.commit(&store, &refs).unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(
            refs.read_ref("refs/components/a").unwrap(),
            Some(ObjectId::from_bytes(b"current"))
        );
        // The orphan is harmless but present.
        assert!(store.exists(&id).unwrap());
    }
}
