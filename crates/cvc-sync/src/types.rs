use std::collections::BTreeMap;

use cvc_types::{ComponentId, LaneId, ObjectId};
use serde::{Deserialize, Serialize};

/// A remote ref update that was not applied, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRejection {
    pub name: String,
    pub reason: String,
}

/// What to export. Components on the listed lanes are exported with them.
#[derive(Clone, Debug, Default)]
pub struct ExportRequest {
    pub ids: Vec<ComponentId>,
    pub lanes: Vec<LaneId>,
}

impl ExportRequest {
    pub fn components(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            lanes: Vec::new(),
        }
    }

    pub fn with_lane(mut self, lane: LaneId) -> Self {
        self.lanes.push(lane);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedComponent {
    /// The id before export; unscoped on a first export.
    pub previous_id: ComponentId,
    pub id: ComponentId,
    pub head: Option<ObjectId>,
}

#[derive(Clone, Debug, Default)]
pub struct ExportResult {
    pub scope: String,
    pub components: Vec<ExportedComponent>,
    /// Exported lanes by their new, scoped id.
    pub lanes: Vec<LaneId>,
    /// Old version id to rewritten version id.
    pub rewritten: BTreeMap<ObjectId, ObjectId>,
    pub objects_sent: usize,
}

impl ExportResult {
    pub fn component(&self, key: &str) -> Option<&ExportedComponent> {
        self.components.iter().find(|c| c.id.key() == key)
    }
}

/// What to import. Unscoped lane ids are qualified with the remote's name.
#[derive(Clone, Debug, Default)]
pub struct ImportRequest {
    pub ids: Vec<ComponentId>,
    pub lanes: Vec<LaneId>,
}

impl ImportRequest {
    pub fn components(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            lanes: Vec::new(),
        }
    }

    pub fn with_lane(mut self, lane: LaneId) -> Self {
        self.lanes.push(lane);
        self
    }
}

/// How an imported ref relates to what was there locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStatus {
    /// Nothing local; the ref was created.
    Created,
    /// Local was behind and now points at the remote state.
    FastForward,
    UpToDate,
    /// Local already contains the remote state; left alone.
    LocalAhead,
    /// Both sides have work the other lacks; local left alone.
    Diverged,
}

impl ImportStatus {
    pub fn updated(&self) -> bool {
        matches!(self, Self::Created | Self::FastForward)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedComponent {
    pub id: ComponentId,
    pub status: ImportStatus,
    pub head: Option<ObjectId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedLane {
    pub id: LaneId,
    pub status: ImportStatus,
}

#[derive(Clone, Debug, Default)]
pub struct ImportResult {
    pub components: Vec<ImportedComponent>,
    pub lanes: Vec<ImportedLane>,
    pub objects_fetched: usize,
}

impl ImportResult {
    pub fn component(&self, key: &str) -> Option<&ImportedComponent> {
        self.components.iter().find(|c| c.id.key() == key)
    }

    pub fn diverged(&self) -> Vec<&ComponentId> {
        self.components
            .iter()
            .filter(|c| c.status == ImportStatus::Diverged)
            .map(|c| &c.id)
            .collect()
    }
}
