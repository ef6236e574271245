use std::collections::BTreeMap;

use cvc_store::{ObjectKind, StoreResult, StoredObject};
use cvc_types::{ComponentId, ObjectId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::semver::SemVer;

/// Who recorded a version or lane state, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub author: String,
    pub timestamp: Timestamp,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: author.into(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Outcome of the build pipeline for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

/// Which dependency table a dependency came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyLifecycle {
    Runtime,
    Dev,
    Peer,
}

/// A dependency on another component, pinned to a version label.
///
/// `version` is a semver tag for tagged dependencies and the full version
/// hash for snaps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentDependency {
    pub id: ComponentId,
    pub version: String,
    pub lifecycle: DependencyLifecycle,
}

/// Dependency policy as the resolver returned it, stored verbatim.
///
/// Values are version specs; `"+"` and `"*"` are markers meaning "whatever
/// version of that component is current when tagging".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyPolicy {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl DependencyPolicy {
    /// Marker re-resolved at every tag.
    pub const CURRENT: &'static str = "+";
    /// Marker re-resolved at every tag and on read.
    pub const ANY: &'static str = "*";

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
            && self.dev_dependencies.is_empty()
            && self.peer_dependencies.is_empty()
    }

    /// All entries as `(name, spec, lifecycle)`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, DependencyLifecycle)> {
        let tables = [
            (&self.dependencies, DependencyLifecycle::Runtime),
            (&self.dev_dependencies, DependencyLifecycle::Dev),
            (&self.peer_dependencies, DependencyLifecycle::Peer),
        ];
        tables.into_iter().flat_map(|(table, lifecycle)| {
            table
                .iter()
                .map(move |(name, spec)| (name.as_str(), spec.as_str(), lifecycle))
        })
    }

    pub fn is_marker(spec: &str) -> bool {
        spec == Self::CURRENT || spec == Self::ANY
    }
}

/// An immutable snapshot of one component.
///
/// The object id is a pure function of every field below; nothing about refs
/// or lanes enters it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub component: ComponentId,
    pub sequence: u64,
    /// Semver tag; `None` for a snap, whose label is its own hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<SemVer>,
    pub parents: Vec<ObjectId>,
    pub files: BTreeMap<String, ObjectId>,
    #[serde(default)]
    pub dependencies: Vec<ComponentDependency>,
    #[serde(default)]
    pub policy: DependencyPolicy,
    pub log: LogEntry,
    #[serde(default)]
    pub build_status: BuildStatus,
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Version {
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        StoredObject::encode(ObjectKind::Version, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode(ObjectKind::Version)
    }

    pub fn id(&self) -> StoreResult<ObjectId> {
        Ok(self.to_stored_object()?.compute_id())
    }

    /// The label other versions use to refer to this one.
    pub fn label(&self, id: &ObjectId) -> String {
        match &self.tag {
            Some(tag) => tag.to_string(),
            None => id.to_hex(),
        }
    }

    pub fn is_snap(&self) -> bool {
        self.tag.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Returns `true` if both versions reference the same file set.
    pub fn same_files(&self, other: &Self) -> bool {
        self.files == other.files
    }

    pub fn dependency(&self, component: &ComponentId) -> Option<&ComponentDependency> {
        self.dependencies
            .iter()
            .find(|d| d.id.same_component(component))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_version(files: &[(&str, &[u8])]) -> Version {
        Version {
            component: ComponentId::parse("ui/button").unwrap(),
            sequence: 1,
            tag: None,
            parents: vec![],
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), ObjectId::from_bytes(c)))
                .collect(),
            dependencies: vec![],
            policy: DependencyPolicy::default(),
            log: LogEntry {
                message: "initial".into(),
                author: "dev".into(),
                timestamp: Timestamp::from_millis(1_700_000_000_000),
            },
            build_status: BuildStatus::Pending,
            extensions: BTreeMap::new(),
        }
    }

    #[test]
    fn id_is_stable_across_reserialization() {
        let version = sample_version(&[("index.ts", b"a"), ("button.tsx", b"b")]);
        let id = version.id().unwrap();
        let decoded = Version::from_stored_object(&version.to_stored_object().unwrap()).unwrap();
        assert_eq!(decoded, version);
        assert_eq!(decoded.id().unwrap(), id);
    }

    #[test]
    fn any_field_changes_the_id() {
        let base = sample_version(&[("index.ts", b"a")]);
        let mut tagged = base.clone();
        tagged.tag = Some(SemVer::new(0, 0, 1));
        let mut later = base.clone();
        later.sequence = 2;
        assert_ne!(base.id().unwrap(), tagged.id().unwrap());
        assert_ne!(base.id().unwrap(), later.id().unwrap());
    }

    #[test]
    fn label_is_tag_or_hash() {
        let mut version = sample_version(&[]);
        let id = version.id().unwrap();
        assert_eq!(version.label(&id), id.to_hex());
        assert!(version.is_snap());
        version.tag = Some(SemVer::new(1, 0, 0));
        assert_eq!(version.label(&id), "1.0.0");
    }

    #[test]
    fn policy_entries_cover_all_tables() {
        let mut policy = DependencyPolicy::default();
        policy.dependencies.insert("ui/icon".into(), "+".into());
        policy.dev_dependencies.insert("tools/lint".into(), "1.0.0".into());
        policy.peer_dependencies.insert("react".into(), "^18".into());
        let entries: Vec<_> = policy.entries().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ("ui/icon", "+", DependencyLifecycle::Runtime));
        assert!(DependencyPolicy::is_marker("*"));
        assert!(!DependencyPolicy::is_marker("^18"));
    }

    proptest! {
        #[test]
        fn hash_is_deterministic(
            paths in proptest::collection::btree_map(
                "[a-z]{1,8}\\.ts",
                proptest::collection::vec(any::<u8>(), 0..32),
                0..6,
            ),
            seq in 1u64..1000,
        ) {
            let mut version = sample_version(&[]);
            version.sequence = seq;
            version.files = paths
                .iter()
                .map(|(p, c)| (p.clone(), ObjectId::from_bytes(c)))
                .collect();
            let first = version.id().unwrap();
            let stored = version.to_stored_object().unwrap();
            let reparsed = Version::from_stored_object(&stored).unwrap();
            prop_assert_eq!(reparsed.id().unwrap(), first);
        }
    }
}
