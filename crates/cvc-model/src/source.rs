use cvc_store::{ObjectKind, StoreError, StoreResult, StoredObject};
use cvc_types::ObjectId;

/// Raw bytes of one file, addressed by their hash.
///
/// Sources are stored as-is (no JSON wrapping), so two versions that share a
/// file's content share the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    content: Vec<u8>,
}

impl Source {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn id(&self) -> ObjectId {
        self.to_stored_object().compute_id()
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Source, self.content.clone())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Source {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected source, got {}", obj.kind),
            });
        }
        Ok(Self::new(obj.data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_equal_id() {
        assert_eq!(Source::new("a").id(), Source::new("a").id());
        assert_ne!(Source::new("a").id(), Source::new("b").id());
    }

    #[test]
    fn stored_roundtrip_keeps_raw_bytes() {
        let src = Source::new(b"export const x = 1;".to_vec());
        let stored = src.to_stored_object();
        assert_eq!(stored.data, src.content());
        assert_eq!(Source::from_stored_object(&stored).unwrap(), src);
    }

    #[test]
    fn wrong_kind_rejected() {
        let stored = StoredObject::new(ObjectKind::Version, b"{}".to_vec());
        assert!(Source::from_stored_object(&stored).is_err());
    }
}
