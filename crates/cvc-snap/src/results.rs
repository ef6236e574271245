use cvc_types::{ComponentId, ObjectId};
use serde::{Deserialize, Serialize};

/// Where a tracked component stands relative to its head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentState {
    /// No change since the head version.
    Untracked,
    /// New, or the working files differ from the head version.
    ModifiedPending,
    /// A version is recorded for a later persist.
    SoftTagged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub id: ComponentId,
    pub state: ComponentState,
    pub head: Option<ObjectId>,
}

/// A component versioned by a tag or snap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedComponent {
    pub id: ComponentId,
    /// `None` for a soft tag, which persists nothing.
    pub version_id: Option<ObjectId>,
    /// Semver tag, or the version hash for a snap.
    pub label: String,
}

/// A dependent versioned because something it depends on was.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoTagged {
    pub component: TaggedComponent,
    pub triggered_by: Vec<ComponentId>,
}

/// A component left out of the batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedComponent {
    pub id: ComponentId,
    pub reason: String,
}

/// What a tag or snap did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResults {
    pub tagged: Vec<TaggedComponent>,
    pub new_components: Vec<ComponentId>,
    pub auto_tagged: Vec<AutoTagged>,
    pub failed: Vec<FailedComponent>,
    pub warnings: Vec<String>,
    pub is_soft_tag: bool,
}

impl TagResults {
    pub fn tagged_ids(&self) -> Vec<&ComponentId> {
        self.tagged.iter().map(|t| &t.id).collect()
    }

    pub fn auto_tagged_ids(&self) -> Vec<&ComponentId> {
        self.auto_tagged.iter().map(|a| &a.component.id).collect()
    }

    /// The result for `id`, explicit or auto-tagged.
    pub fn get(&self, id: &ComponentId) -> Option<&TaggedComponent> {
        self.tagged
            .iter()
            .chain(self.auto_tagged.iter().map(|a| &a.component))
            .find(|t| t.id.same_component(id))
    }
}
