use std::fs;
use std::path::{Path, PathBuf};

use cvc_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::fsutil::atomic_write;
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

const COMPRESSION_LEVEL: i32 = 3;

/// On-disk envelope: bincode of kind + data, then zstd.
#[derive(Serialize, Deserialize)]
struct Envelope {
    kind: ObjectKind,
    data: Vec<u8>,
}

/// Filesystem object store.
///
/// Objects live at `<root>/objects/<first 2 hex>/<remaining 62 hex>`. Each
/// write goes to a temporary file in the same directory, is fsynced, and is
/// then renamed into place, so a crash never leaves a half-written object
/// under its final name.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    objects_dir: PathBuf,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let objects_dir = root.as_ref().join("objects");
        fs::create_dir_all(&objects_dir)?;
        Ok(Self { objects_dir })
    }

    /// Path of the file holding `id`.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn encode(object: &StoredObject) -> StoreResult<Vec<u8>> {
        let envelope = Envelope {
            kind: object.kind,
            data: object.data.clone(),
        };
        let raw = bincode::serialize(&envelope)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(zstd::encode_all(raw.as_slice(), COMPRESSION_LEVEL)?)
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<StoredObject> {
        let corrupt = |reason: String| StoreError::CorruptObject { id: *id, reason };
        let raw = zstd::decode_all(bytes)
            .map_err(|e| corrupt(format!("decompression failed: {e}")))?;
        let envelope: Envelope =
            bincode::deserialize(&raw).map_err(|e| corrupt(format!("bad envelope: {e}")))?;
        Ok(StoredObject::new(envelope.kind, envelope.data))
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let bytes = match fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = Self::decode(id, &bytes)?;
        object.verify(id)?;
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path.parent().unwrap_or(&self.objects_dir);
        fs::create_dir_all(dir)?;

        atomic_write(&path, &Self::encode(object)?)?;
        debug!(id = %id.short_hex(), kind = %object.kind, size = object.size, "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).exists())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
