use cvc_model::{BuildStatus, ComponentDependency, HistoryEntry, SemVer, Version};
use cvc_sources::FileMap;
use cvc_types::{ComponentId, ObjectId, Timestamp};
use serde::{Deserialize, Serialize};

/// One row of a component listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentListing {
    pub id: ComponentId,
    pub latest_tag: Option<SemVer>,
    /// Main-line head.
    pub head: Option<ObjectId>,
}

impl ComponentListing {
    pub fn scope(&self) -> Option<&str> {
        self.id.scope()
    }
}

/// One version in a log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: ObjectId,
    /// Semver tag, or the version hash for a snap.
    pub label: String,
    pub sequence: u64,
    pub message: String,
    pub author: String,
    pub timestamp: Timestamp,
    pub build_status: BuildStatus,
    pub parents: Vec<ObjectId>,
}

impl VersionSummary {
    pub fn new(id: ObjectId, version: &Version) -> Self {
        Self {
            id,
            label: version.label(&id),
            sequence: version.sequence,
            message: version.log.message.clone(),
            author: version.log.author.clone(),
            timestamp: version.log.timestamp,
            build_status: version.build_status,
            parents: version.parents.clone(),
        }
    }

    pub fn is_snap(&self) -> bool {
        ObjectId::is_hex_id(&self.label)
    }
}

/// A version with its file contents and resolved dependencies.
#[derive(Clone, Debug)]
pub struct ShownVersion {
    pub id: ObjectId,
    pub label: String,
    pub version: Version,
    pub files: FileMap,
    /// Dependencies as they resolve now; `*` entries follow the latest tag.
    pub dependencies: Vec<ComponentDependency>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutFailure {
    pub id: ComponentId,
    pub reason: String,
}

/// What checking out a lane history entry wrote to the working area.
#[derive(Clone, Debug)]
pub struct HistoryMaterialization {
    pub entry: HistoryEntry,
    /// Components whose files were written.
    pub components: Vec<ComponentId>,
    /// Components that could not be materialized, and why.
    pub failed_components: Vec<CheckoutFailure>,
}

impl HistoryMaterialization {
    pub fn is_complete(&self) -> bool {
        self.failed_components.is_empty()
    }
}
