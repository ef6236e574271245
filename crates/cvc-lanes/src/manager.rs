use cvc_model::{HistoryEntry, Lane, LaneHistory, LaneOperation, LogEntry};
use cvc_refs::{lane_history_ref, lane_ref, names, Head, RefStore, RefUpdate};
use cvc_sources::{SourceRepository, StagedCommit};
use cvc_store::ObjectStore;
use cvc_types::{ComponentId, LaneId, ObjectId, Timestamp, MAIN_LANE};
use tracing::{debug, info};

use crate::config::LaneConfig;
use crate::error::{LaneError, LaneResult};

/// A lane as currently referenced: its state object and that object's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneState {
    pub object_id: ObjectId,
    pub lane: Lane,
}

impl LaneState {
    pub fn id(&self) -> &LaneId {
        &self.lane.id
    }
}

/// The component set recorded by one lane history entry.
#[derive(Debug, Clone)]
pub struct HistoryCheckout {
    pub entry: HistoryEntry,
    pub lane: Lane,
}

/// Creates, switches, removes, restores, diffs and merges lanes.
#[derive(Clone)]
pub struct LaneManager {
    sources: SourceRepository,
    config: LaneConfig,
}

impl LaneManager {
    pub fn new(sources: SourceRepository, config: LaneConfig) -> Self {
        Self { sources, config }
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    pub fn sources(&self) -> &SourceRepository {
        &self.sources
    }

    pub(crate) fn refs(&self) -> &dyn RefStore {
        self.sources.refs()
    }

    pub(crate) fn objects(&self) -> &dyn ObjectStore {
        self.sources.objects()
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// The current state of a lane, or `None` if it has no ref.
    pub fn lane(&self, id: &LaneId) -> LaneResult<Option<LaneState>> {
        let Some(object_id) = self.refs().read_ref(&lane_ref(id))? else {
            return Ok(None);
        };
        let lane = self.lane_by_hash(&object_id)?;
        Ok(Some(LaneState { object_id, lane }))
    }

    /// Like [`lane`](Self::lane) but absence is an error.
    pub fn load_lane(&self, id: &LaneId) -> LaneResult<LaneState> {
        self.lane(id)?
            .ok_or_else(|| LaneError::NotFound(id.to_string()))
    }

    /// Load any lane state ever stored, referenced or not.
    pub fn lane_by_hash(&self, object_id: &ObjectId) -> LaneResult<Lane> {
        let obj = self.objects().get(object_id)?;
        Ok(Lane::from_stored_object(&obj)?)
    }

    pub fn get_lanes(&self) -> LaneResult<Vec<LaneState>> {
        let mut lanes = Vec::new();
        for (name, object_id) in self.refs().lane_refs()? {
            if names::lane_id(&name).is_none() {
                continue;
            }
            let lane = self.lane_by_hash(&object_id)?;
            lanes.push(LaneState { object_id, lane });
        }
        Ok(lanes)
    }

    pub fn current_head(&self) -> LaneResult<Head> {
        Ok(self.refs().head()?)
    }

    /// The active lane, or `None` on main.
    pub fn current_lane(&self) -> LaneResult<Option<LaneState>> {
        match self.current_head()? {
            Head::Main => Ok(None),
            Head::Lane(id) => self.load_lane(&id).map(Some),
        }
    }

    /// Main-line heads of every component that has one.
    pub fn main_heads(&self) -> LaneResult<Vec<(ComponentId, ObjectId)>> {
        Ok(self
            .sources
            .list_components()?
            .into_iter()
            .filter_map(|c| c.head.map(|h| (c.id, h)))
            .collect())
    }

    pub fn main_head(&self, component: &ComponentId) -> LaneResult<Option<ObjectId>> {
        Ok(self
            .sources
            .get_component(component)?
            .and_then(|(_, c)| c.head))
    }

    /// Where new work on `component` builds from under `head`: the lane's
    /// head for it if the lane has one, else main.
    pub fn effective_head(
        &self,
        head: &Head,
        component: &ComponentId,
    ) -> LaneResult<Option<ObjectId>> {
        if let Head::Lane(id) = head {
            if let Some(found) = self.load_lane(id)?.lane.head_of(component) {
                return Ok(Some(found));
            }
        }
        self.main_head(component)
    }

    pub(crate) fn parse_lane(name: &str) -> LaneResult<LaneId> {
        Ok(LaneId::parse(name)?)
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Create a lane from the current heads and make it active.
    ///
    /// Forking from a lane copies that lane's heads; forking from main copies
    /// main's.
    pub fn create_lane(&self, name: &str, log: LogEntry) -> LaneResult<LaneState> {
        let id = LaneId::new(name)?;
        if self.lane(&id)?.is_some() {
            return Err(LaneError::AlreadyExists(id));
        }
        let lane = match self.current_lane()? {
            Some(parent) => {
                let mut lane = Lane::new(id.clone(), Some(parent.lane.id.clone()), log);
                lane.components = parent.lane.components;
                lane
            }
            None => {
                let mut lane = Lane::new(id.clone(), None, log);
                for (component, head) in self.main_heads()? {
                    lane.set_head(component, head);
                }
                lane
            }
        };

        let mut staged = StagedCommit::new();
        let components = self.render_components(&lane)?;
        let object_id =
            self.stage_lane_state(
                &mut staged,
                None,
                &lane,
                LaneOperation::Create,
                None,
                components,
            )?;
        staged.commit(self.objects(), self.refs())?;
        self.refs().set_head(&Head::Lane(id.clone()))?;

        info!(lane = %id, components = lane.components.len(), "lane created");
        Ok(LaneState { object_id, lane })
    }

    /// Make `target` (`"main"` or an existing lane) the active history.
    pub fn switch_lanes(&self, target: &str) -> LaneResult<Head> {
        let head = if target == MAIN_LANE {
            Head::Main
        } else {
            let id = Self::parse_lane(target)?;
            self.load_lane(&id)?;
            Head::Lane(id)
        };
        self.refs().set_head(&head)?;
        debug!(head = %head.name(), "switched lanes");
        Ok(head)
    }

    /// Detach lane refs. Lane objects and history stay in the store.
    ///
    /// Removing the active lane needs `force` and switches back to main.
    pub fn remove_lanes(&self, lanes: &[&str], force: bool) -> LaneResult<Vec<LaneId>> {
        let active = self.current_head()?;
        let mut states = Vec::with_capacity(lanes.len());
        for name in lanes {
            let state = self.load_lane(&Self::parse_lane(name)?)?;
            if active.lane() == Some(state.id()) && !force {
                return Err(LaneError::ActiveLane(state.lane.id));
            }
            states.push(state);
        }

        let updates: Vec<RefUpdate> = states
            .iter()
            .map(|s| RefUpdate::delete(lane_ref(s.id()), s.object_id))
            .collect();
        self.refs().update_refs(&updates)?;
        if states.iter().any(|s| active.lane() == Some(s.id())) {
            self.refs().set_head(&Head::Main)?;
        }

        let removed: Vec<LaneId> = states.into_iter().map(|s| s.lane.id).collect();
        let names: Vec<String> = removed.iter().map(ToString::to_string).collect();
        info!(lanes = ?names, "lanes removed");
        Ok(removed)
    }

    /// Re-attach a lane ref to a stored lane state.
    pub fn restore_lane(&self, object_id: &ObjectId) -> LaneResult<LaneState> {
        let lane = self.lane_by_hash(object_id)?;
        if self.lane(&lane.id)?.is_some() {
            return Err(LaneError::RestoreConflict(lane.id));
        }
        let mut staged = StagedCommit::new();
        let components = self.render_components(&lane)?;
        let restored =
            self.stage_lane_state(
                &mut staged,
                None,
                &lane,
                LaneOperation::Restore,
                None,
                components,
            )?;
        staged.commit(self.objects(), self.refs())?;
        info!(lane = %lane.id, state = %restored.short_hex(), "lane restored");
        Ok(LaneState {
            object_id: restored,
            lane,
        })
    }

    // ---------------------------------------------------------------
    // State updates
    // ---------------------------------------------------------------

    /// Stage `next` as the new state of its lane, replacing `current`
    /// (`None` when the lane ref must not exist yet), and append a history
    /// entry when history is enabled. Returns the new lane object id.
    pub fn stage_lane_state(
        &self,
        staged: &mut StagedCommit,
        current: Option<&LaneState>,
        next: &Lane,
        operation: LaneOperation,
        message: Option<String>,
        components: Vec<String>,
    ) -> LaneResult<ObjectId> {
        let object_id = staged.stage(next.to_stored_object()?);
        staged.update_ref(RefUpdate::swap(
            lane_ref(&next.id),
            current.map(|c| c.object_id),
            object_id,
        ));

        if self.config.history_enabled {
            let history_ref = lane_history_ref(&next.id);
            let previous = self.refs().read_ref(&history_ref)?;
            let mut history = match previous {
                Some(id) => LaneHistory::from_stored_object(&self.objects().get(&id)?)?,
                None => LaneHistory::new(next.id.clone()),
            };
            history.append(object_id, operation, message, components, Timestamp::now())?;
            let history_id = staged.stage(history.to_stored_object()?);
            staged.update_ref(RefUpdate::swap(history_ref, previous, history_id));
        }
        Ok(object_id)
    }

    /// Stage a snap on a lane. The history message is `snap (<message>)`, or
    /// `snap` without one.
    pub fn record_snap(
        &self,
        staged: &mut StagedCommit,
        current: &LaneState,
        next: &Lane,
        components: Vec<String>,
        message: Option<&str>,
    ) -> LaneResult<ObjectId> {
        let message = match message.filter(|m| !m.is_empty()) {
            Some(m) => format!("snap ({m})"),
            None => "snap".to_string(),
        };
        self.stage_lane_state(
            staged,
            Some(current),
            next,
            LaneOperation::Snap,
            Some(message),
            components,
        )
    }

    /// `id@version` for every component on a lane.
    pub fn render_components(&self, lane: &Lane) -> LaneResult<Vec<String>> {
        lane.components
            .values()
            .map(|c| Ok(format!("{}@{}", c.id, self.version_label(&c.head)?)))
            .collect()
    }

    pub(crate) fn version_label(&self, version: &ObjectId) -> LaneResult<String> {
        let loaded = self.sources.load_version(version)?;
        Ok(loaded.label(version))
    }

    // ---------------------------------------------------------------
    // History
    // ---------------------------------------------------------------

    /// The recorded history of a lane (empty when history is disabled).
    pub fn get_lane_history(&self, id: &LaneId) -> LaneResult<LaneHistory> {
        match self.refs().read_ref(&lane_history_ref(id))? {
            Some(history_id) => {
                let obj = self.objects().get(&history_id)?;
                Ok(LaneHistory::from_stored_object(&obj)?)
            }
            None => {
                self.load_lane(id)?;
                Ok(LaneHistory::new(id.clone()))
            }
        }
    }

    /// The component set a history entry recorded. Mutates nothing.
    pub fn checkout_history(&self, id: &LaneId, entry_id: &str) -> LaneResult<HistoryCheckout> {
        let history = self.get_lane_history(id)?;
        let entry = history
            .entry(entry_id)
            .cloned()
            .ok_or_else(|| LaneError::HistoryEntryNotFound {
                lane: id.clone(),
                entry: entry_id.to_string(),
            })?;
        let lane = self.lane_by_hash(&entry.lane_state)?;
        Ok(HistoryCheckout { entry, lane })
    }
}
