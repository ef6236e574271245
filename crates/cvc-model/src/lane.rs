use std::collections::BTreeMap;

use cvc_store::{ObjectKind, StoreResult, StoredObject};
use cvc_types::{ComponentId, LaneId, ObjectId};
use serde::{Deserialize, Serialize};

use crate::version::LogEntry;

/// A component's head on a lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneComponent {
    pub id: ComponentId,
    pub head: ObjectId,
}

/// One state of a lane: the head version of every component on it.
///
/// Each snap, merge or restore writes a new `Lane` object; the lane ref is
/// swapped to it. Old states stay in the store and can be restored by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    /// Keyed by component identity key.
    #[serde(default)]
    pub components: BTreeMap<String, LaneComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<LaneId>,
    pub log: LogEntry,
}

impl Lane {
    pub fn new(id: LaneId, forked_from: Option<LaneId>, log: LogEntry) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
            forked_from,
            log,
        }
    }

    pub fn head_of(&self, component: &ComponentId) -> Option<ObjectId> {
        self.components.get(&component.key()).map(|c| c.head)
    }

    pub fn set_head(&mut self, component: ComponentId, head: ObjectId) {
        self.components
            .insert(component.key(), LaneComponent { id: component, head });
    }

    pub fn contains(&self, component: &ComponentId) -> bool {
        self.components.contains_key(&component.key())
    }

    pub fn component_ids(&self) -> impl Iterator<Item = &ComponentId> {
        self.components.values().map(|c| &c.id)
    }

    /// A successor state with a fresh log entry and the same heads.
    pub fn next_state(&self, log: LogEntry) -> Self {
        Self {
            log,
            ..self.clone()
        }
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        StoredObject::encode(ObjectKind::Lane, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode(ObjectKind::Lane)
    }

    pub fn object_id(&self) -> StoreResult<ObjectId> {
        Ok(self.to_stored_object()?.compute_id())
    }
}
