use async_trait::async_trait;
use cvc_refs::RefUpdate;
use cvc_store::StoredObject;
use cvc_types::ObjectId;

use crate::error::SyncResult;
use crate::types::RefRejection;

/// Transport interface for a remote scope.
#[async_trait]
pub trait RemoteScope: Send + Sync {
    /// The scope name exported components are qualified with.
    fn name(&self) -> &str;

    async fn list_refs(&self, prefix: &str) -> SyncResult<Vec<(String, ObjectId)>>;

    /// The subset of `ids` the remote does not hold.
    async fn missing_objects(&self, ids: &[ObjectId]) -> SyncResult<Vec<ObjectId>>;

    /// Objects the remote holds among `ids`, paired with the id they were
    /// requested under. Absent ids are left out.
    async fn fetch_objects(&self, ids: &[ObjectId]) -> SyncResult<Vec<(ObjectId, StoredObject)>>;

    async fn push_objects(&self, objects: &[StoredObject]) -> SyncResult<Vec<ObjectId>>;

    /// Apply ref updates, each as its own compare-and-swap. Updates that do
    /// not apply are returned instead of failing the call.
    async fn update_refs(&self, updates: &[RefUpdate]) -> SyncResult<Vec<RefRejection>>;
}
