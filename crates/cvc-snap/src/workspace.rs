//! The working area: component files being edited, plus soft-tag intents.

use std::collections::BTreeMap;

use cvc_model::{SemVer, Source, Version};
use cvc_sources::FileMap;
use cvc_types::{ComponentId, ObjectId};
use serde::{Deserialize, Serialize};

/// A version recorded by a soft tag, to be applied by a later persist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftTag {
    pub version: SemVer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One tracked component in the working area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceComponent {
    pub id: ComponentId,
    pub files: FileMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_tag: Option<SoftTag>,
}

impl WorkspaceComponent {
    /// Path → source id of the working files.
    pub fn file_ids(&self) -> BTreeMap<String, ObjectId> {
        self.files
            .iter()
            .map(|(path, content)| (path.clone(), Source::new(content.clone()).id()))
            .collect()
    }

    /// Returns `true` if the working files differ from `version`'s.
    pub fn differs_from(&self, version: &Version) -> bool {
        self.file_ids() != version.files
    }
}

/// Tracked components keyed by identity key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    components: BTreeMap<String, WorkspaceComponent>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id` with `files`, or replace its files.
    pub fn track(&mut self, id: ComponentId, files: FileMap) {
        match self.components.get_mut(&id.key()) {
            Some(existing) => existing.files = files,
            None => {
                self.components.insert(
                    id.key(),
                    WorkspaceComponent {
                        id,
                        files,
                        soft_tag: None,
                    },
                );
            }
        }
    }

    /// Write one file of a tracked component.
    pub fn write_file(
        &mut self,
        id: &ComponentId,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> bool {
        match self.components.get_mut(&id.key()) {
            Some(component) => {
                component.files.insert(path.into(), content.into());
                true
            }
            None => false,
        }
    }

    pub fn untrack(&mut self, id: &ComponentId) -> Option<WorkspaceComponent> {
        self.components.remove(&id.key())
    }

    pub fn get(&self, id: &ComponentId) -> Option<&WorkspaceComponent> {
        self.components.get(&id.key())
    }

    pub fn components(&self) -> impl Iterator<Item = &WorkspaceComponent> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Replace a component's id in place (its scope changed on export).
    pub fn rename(&mut self, id: &ComponentId) {
        if let Some(component) = self.components.get_mut(&id.key()) {
            component.id = id.clone();
        }
    }

    pub fn set_soft_tag(&mut self, id: &ComponentId, tag: SoftTag) {
        if let Some(component) = self.components.get_mut(&id.key()) {
            component.soft_tag = Some(tag);
        }
    }

    pub fn clear_soft_tag(&mut self, id: &ComponentId) {
        if let Some(component) = self.components.get_mut(&id.key()) {
            component.soft_tag = None;
        }
    }

    /// Components carrying a soft tag.
    pub fn soft_tagged(&self) -> impl Iterator<Item = &WorkspaceComponent> {
        self.components.values().filter(|c| c.soft_tag.is_some())
    }
}
