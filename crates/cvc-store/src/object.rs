use cvc_crypto::ContentHasher;
use cvc_types::ObjectId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored. Selects the hashing domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw bytes of one source file.
    Source,
    /// Immutable version snapshot of a component.
    Version,
    /// Component record (head, tags, sequence counter).
    Component,
    /// Lane state: per-component heads of a parallel history.
    Lane,
    /// Append-only log of lane mutations.
    LaneHistory,
}

impl ObjectKind {
    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Source => &ContentHasher::SOURCE,
            Self::Version => &ContentHasher::VERSION,
            Self::Component => &ContentHasher::COMPONENT,
            Self::Lane => &ContentHasher::LANE,
            Self::LaneHistory => &ContentHasher::LANE_HISTORY,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Version => write!(f, "version"),
            Self::Component => write!(f, "component"),
            Self::Lane => write!(f, "lane"),
            Self::LaneHistory => write!(f, "lane-history"),
        }
    }
}

/// A stored object: kind tag + serialized data + cached size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The serialized bytes of the object.
    pub data: Vec<u8>,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredObject {
    /// Create a new stored object from kind and data.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Encode a typed record as canonical JSON.
    ///
    /// Determinism depends on `value` using ordered maps throughout.
    pub fn encode<T: Serialize>(kind: ObjectKind, value: &T) -> StoreResult<Self> {
        let data = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self::new(kind, data))
    }

    /// Decode a typed record, checking the kind tag first.
    pub fn decode<T: DeserializeOwned>(&self, expected: ObjectKind) -> StoreResult<T> {
        if self.kind != expected {
            return Err(StoreError::CorruptObject {
                id: self.compute_id(),
                reason: format!("expected {expected}, got {}", self.kind),
            });
        }
        serde_json::from_slice(&self.data).map_err(|e| StoreError::CorruptObject {
            id: self.compute_id(),
            reason: format!("undecodable {expected}: {e}"),
        })
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }

    /// Fail with `CorruptObject` unless this object hashes to `id`.
    pub fn verify(&self, id: &ObjectId) -> StoreResult<()> {
        let computed = self.compute_id();
        if computed != *id {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!("content hashes to {}", computed.short_hex()),
            });
        }
        Ok(())
    }
}
