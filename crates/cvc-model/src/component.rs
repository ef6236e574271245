use std::collections::BTreeMap;

use cvc_store::{ObjectKind, StoreResult, StoredObject};
use cvc_types::{ComponentId, ObjectId};
use serde::{Deserialize, Serialize};

use crate::semver::SemVer;

/// The record a component ref points at.
///
/// A component's identity never changes; every mutation (new head, new tag)
/// produces a new `Component` object and the ref is swapped to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    /// Main-line head. Lane heads live in lane objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<ObjectId>,
    #[serde(default)]
    pub tags: BTreeMap<SemVer, ObjectId>,
    #[serde(default)]
    pub last_sequence: u64,
}

impl Component {
    /// An empty component record with no history.
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            head: None,
            tags: BTreeMap::new(),
            last_sequence: 0,
        }
    }

    /// The scope-independent ref key.
    pub fn key(&self) -> String {
        self.id.key()
    }

    pub fn is_new(&self) -> bool {
        self.head.is_none()
    }

    /// Highest tag by semver precedence.
    pub fn latest_tag(&self) -> Option<(&SemVer, &ObjectId)> {
        self.tags.iter().next_back()
    }

    pub fn has_tag(&self, tag: &SemVer) -> bool {
        self.tags.contains_key(tag)
    }

    /// The tag pointing at `version`, if any.
    pub fn tag_of(&self, version: &ObjectId) -> Option<&SemVer> {
        self.tags
            .iter()
            .find_map(|(tag, id)| (id == version).then_some(tag))
    }

    /// Resolve a version label: a semver tag or a full version hash.
    pub fn resolve_label(&self, label: &str) -> Option<ObjectId> {
        if ObjectId::is_hex_id(label) {
            return label.parse().ok();
        }
        let tag = SemVer::parse(label).ok()?;
        self.tags.get(&tag).copied()
    }

    pub fn next_sequence(&self) -> u64 {
        self.last_sequence + 1
    }

    /// Record `version` (with `sequence`) as the new main head, tagging it if
    /// `tag` is given.
    pub fn advance(&self, version: ObjectId, sequence: u64, tag: Option<SemVer>) -> Self {
        let mut next = self.clone();
        next.head = Some(version);
        next.last_sequence = next.last_sequence.max(sequence);
        if let Some(tag) = tag {
            next.tags.insert(tag, version);
        }
        next
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        StoredObject::encode(ObjectKind::Component, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode(ObjectKind::Component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp() -> Component {
        Component::new(ComponentId::parse("ui/button").unwrap())
    }

    #[test]
    fn new_component_is_empty() {
        let c = comp();
        assert!(c.is_new());
        assert!(c.latest_tag().is_none());
        assert_eq!(c.next_sequence(), 1);
        assert_eq!(c.key(), "ui/button");
    }

    #[test]
    fn latest_tag_uses_semver_precedence() {
        let v1 = ObjectId::from_bytes(b"v1");
        let v2 = ObjectId::from_bytes(b"v2");
        let v3 = ObjectId::from_bytes(b"v3");
        let c = comp()
            .advance(v1, 1, Some(SemVer::parse("0.0.9").unwrap()))
            .advance(v2, 2, Some(SemVer::parse("0.0.10").unwrap()))
            .advance(v3, 3, Some(SemVer::parse("0.0.11-dev.0").unwrap()));
        let (tag, id) = c.latest_tag().unwrap();
        assert_eq!(tag.to_string(), "0.0.11-dev.0");
        assert_eq!(*id, v3);
        assert_eq!(c.head, Some(v3));
        assert_eq!(c.last_sequence, 3);
    }

    #[test]
    fn resolve_label_by_tag_or_hash() {
        let v1 = ObjectId::from_bytes(b"v1");
        let c = comp().advance(v1, 1, Some(SemVer::new(0, 0, 1)));
        assert_eq!(c.resolve_label("0.0.1"), Some(v1));
        assert_eq!(c.resolve_label(&v1.to_hex()), Some(v1));
        assert_eq!(c.resolve_label("9.9.9"), None);
        assert_eq!(c.tag_of(&v1).map(ToString::to_string), Some("0.0.1".into()));
    }

    #[test]
    fn snap_advance_keeps_tags() {
        let v1 = ObjectId::from_bytes(b"v1");
        let v2 = ObjectId::from_bytes(b"v2");
        let c = comp().advance(v1, 1, Some(SemVer::new(0, 0, 1))).advance(v2, 2, None);
        assert_eq!(c.head, Some(v2));
        assert_eq!(c.tags.len(), 1);
    }

    #[test]
    fn stored_roundtrip() {
        let c = comp().advance(ObjectId::from_bytes(b"v1"), 1, Some(SemVer::new(1, 2, 3)));
        let decoded = Component::from_stored_object(&c.to_stored_object().unwrap()).unwrap();
        assert_eq!(decoded, c);
    }
}
