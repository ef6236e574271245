use std::collections::HashMap;

use cvc_store::StoredObject;
use cvc_types::ObjectId;

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteScope;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub objects_verified: usize,
    pub bytes_received: u64,
}

/// Checks what a remote sent before any of it is written locally.
pub struct SyncVerifier;

impl SyncVerifier {
    /// Every requested id must be present and hash to itself.
    ///
    /// Returns the objects keyed by id. Fails with `CorruptObject` on the
    /// first hash mismatch and `MissingObject` on the first gap.
    pub fn verify_received(
        requested: &[ObjectId],
        received: Vec<(ObjectId, StoredObject)>,
    ) -> SyncResult<(HashMap<ObjectId, StoredObject>, VerificationReport)> {
        let mut report = VerificationReport::default();
        let mut objects = HashMap::with_capacity(received.len());
        for (id, object) in received {
            object.verify(&id)?;
            report.objects_verified += 1;
            report.bytes_received += object.size;
            objects.insert(id, object);
        }
        if let Some(missing) = requested.iter().find(|id| !objects.contains_key(id)) {
            return Err(SyncError::MissingObject(*missing));
        }
        Ok((objects, report))
    }
}

/// Fetch `ids` from `remote` and verify them.
pub(crate) async fn fetch_verified(
    remote: &dyn RemoteScope,
    ids: &[ObjectId],
) -> SyncResult<(HashMap<ObjectId, StoredObject>, VerificationReport)> {
    if ids.is_empty() {
        return Ok((HashMap::new(), VerificationReport::default()));
    }
    let received = remote.fetch_objects(ids).await?;
    SyncVerifier::verify_received(ids, received)
}
