use async_trait::async_trait;
use cvc_refs::{InMemoryRefStore, RefError, RefStore, RefUpdate};
use cvc_store::{InMemoryObjectStore, ObjectStore, StoredObject};
use cvc_types::ObjectId;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::negotiation::NegotiationEngine;
use crate::transport::RemoteScope;
use crate::types::RefRejection;

/// A remote scope held in memory: an object store and a ref table.
pub struct InMemoryRemote {
    name: String,
    objects: InMemoryObjectStore,
    refs: InMemoryRefStore,
}

impl InMemoryRemote {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: InMemoryObjectStore::new(),
            refs: InMemoryRefStore::new(),
        }
    }

    pub fn objects(&self) -> &InMemoryObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &InMemoryRefStore {
        &self.refs
    }
}

#[async_trait]
impl RemoteScope for InMemoryRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_refs(&self, prefix: &str) -> SyncResult<Vec<(String, ObjectId)>> {
        Ok(self.refs.list_refs(prefix)?)
    }

    async fn missing_objects(&self, ids: &[ObjectId]) -> SyncResult<Vec<ObjectId>> {
        Ok(NegotiationEngine::compute_wants(&self.objects, ids)?)
    }

    async fn fetch_objects(&self, ids: &[ObjectId]) -> SyncResult<Vec<(ObjectId, StoredObject)>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(obj) = self.objects.read(id)? {
                found.push((*id, obj));
            }
        }
        Ok(found)
    }

    async fn push_objects(&self, objects: &[StoredObject]) -> SyncResult<Vec<ObjectId>> {
        let ids = self.objects.write_batch(objects)?;
        debug!(scope = %self.name, count = ids.len(), "received objects");
        Ok(ids)
    }

    async fn update_refs(&self, updates: &[RefUpdate]) -> SyncResult<Vec<RefRejection>> {
        let mut rejected = Vec::new();
        for update in updates {
            if let Some(new) = update.new {
                if !self.objects.exists(&new)? {
                    rejected.push(RefRejection {
                        name: update.name.clone(),
                        reason: format!("target {} was never pushed", new.short_hex()),
                    });
                    continue;
                }
            }
            match self.refs.update_ref(update.clone()) {
                Ok(()) => {}
                Err(
                    e @ (RefError::ConcurrentModification { .. }
                    | RefError::InvalidRefName { .. }),
                ) => {
                    rejected.push(RefRejection {
                        name: update.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(SyncError::Refs(e)),
            }
        }
        Ok(rejected)
    }
}
