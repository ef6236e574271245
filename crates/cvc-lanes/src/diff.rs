//! Lane status against a baseline (main or another lane).

use cvc_graph::Divergence;
use cvc_types::{ComponentId, ObjectId, MAIN_LANE};
use serde::{Deserialize, Serialize};

use crate::error::LaneResult;
use crate::manager::LaneManager;

/// How a lane's head for a component relates to the baseline's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Same version on both sides.
    None,
    /// The lane has versions the baseline lacks, and nothing else.
    Ahead,
    /// The baseline has versions the lane lacks, and nothing else.
    Behind,
    /// Both sides have versions the other lacks.
    Diverged,
}

impl From<Divergence> for ChangeType {
    fn from(d: Divergence) -> Self {
        match d {
            Divergence::Same => Self::None,
            Divergence::Ahead => Self::Ahead,
            Divergence::Behind => Self::Behind,
            Divergence::Diverged => Self::Diverged,
        }
    }
}

/// Status of one lane component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDiff {
    pub id: ComponentId,
    pub lane_head: ObjectId,
    pub baseline_head: Option<ObjectId>,
    /// The baseline has nothing the lane lacks.
    pub up_to_date: bool,
    pub change_type: ChangeType,
    /// The two heads track different file sets or contents.
    pub source_changed: bool,
}

/// Status of every component on a lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneDiff {
    pub lane: String,
    pub baseline: String,
    pub components: Vec<ComponentDiff>,
}

impl LaneDiff {
    pub fn is_up_to_date(&self) -> bool {
        self.components.iter().all(|c| c.up_to_date)
    }

    pub fn component(&self, id: &ComponentId) -> Option<&ComponentDiff> {
        self.components.iter().find(|c| c.id.same_component(id))
    }
}

impl LaneManager {
    /// Compare every component on `lane` with `baseline` (main by default).
    pub fn diff_status(&self, lane: &str, baseline: Option<&str>) -> LaneResult<LaneDiff> {
        let state = self.load_lane(&Self::parse_lane(lane)?)?;
        let baseline_name = baseline.unwrap_or(MAIN_LANE);
        let baseline_lane = if baseline_name == MAIN_LANE {
            None
        } else {
            Some(self.load_lane(&Self::parse_lane(baseline_name)?)?.lane)
        };

        let graph = self.sources().graph();
        let mut components = Vec::with_capacity(state.lane.components.len());
        for entry in state.lane.components.values() {
            let baseline_head = match &baseline_lane {
                Some(lane) => lane.head_of(&entry.id),
                None => self.main_head(&entry.id)?,
            };
            let up_to_date = match &baseline_head {
                Some(base) => graph.is_ancestor(base, &entry.head)?,
                None => true,
            };
            let change_type = graph
                .compare_heads(Some(&entry.head), baseline_head.as_ref())?
                .into();
            let source_changed = match &baseline_head {
                Some(base) if *base != entry.head => {
                    let ours = graph.load_version(&entry.head)?;
                    let theirs = graph.load_version(base)?;
                    !ours.same_files(&theirs)
                }
                Some(_) => false,
                None => true,
            };
            components.push(ComponentDiff {
                id: entry.id.clone(),
                lane_head: entry.head,
                baseline_head,
                up_to_date,
                change_type,
                source_changed,
            });
        }

        Ok(LaneDiff {
            lane: state.lane.id.to_string(),
            baseline: baseline_name.to_string(),
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{comp, manager, snap_lane, snap_main};
    use cvc_model::LogEntry;

    fn staged_lane(mgr: &LaneManager) {
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
    }

    #[test]
    fn fresh_lane_matches_main() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        staged_lane(&mgr);
        let diff = mgr.diff_status("stage", None).unwrap();
        let c = diff.component(&comp("comp1")).unwrap();
        assert!(c.up_to_date);
        assert_eq!(c.change_type, ChangeType::None);
        assert!(!c.source_changed);
    }

    #[test]
    fn lane_snap_is_ahead_and_up_to_date() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        staged_lane(&mgr);
        snap_lane(&mgr, "stage", "comp1", "b");
        let diff = mgr.diff_status("stage", None).unwrap();
        let c = diff.component(&comp("comp1")).unwrap();
        assert!(c.up_to_date);
        assert_eq!(c.change_type, ChangeType::Ahead);
        assert!(c.source_changed);
        assert!(diff.is_up_to_date());
    }

    #[test]
    fn snap_on_main_after_lane_snap_is_not_up_to_date() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        staged_lane(&mgr);
        snap_lane(&mgr, "stage", "comp1", "b");
        mgr.switch_lanes("main").unwrap();
        snap_main(&mgr, "comp1", "c");

        let diff = mgr.diff_status("stage", None).unwrap();
        let c = diff.component(&comp("comp1")).unwrap();
        assert!(!c.up_to_date);
        assert_eq!(c.change_type, ChangeType::Diverged);
    }

    #[test]
    fn main_only_moves_means_behind() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        staged_lane(&mgr);
        mgr.switch_lanes("main").unwrap();
        snap_main(&mgr, "comp1", "b");
        let diff = mgr.diff_status("stage", Some("main")).unwrap();
        let c = diff.component(&comp("comp1")).unwrap();
        assert!(!c.up_to_date);
        assert_eq!(c.change_type, ChangeType::Behind);
    }

    #[test]
    fn baseline_can_be_another_lane() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        staged_lane(&mgr);
        snap_lane(&mgr, "stage", "comp1", "b");
        mgr.create_lane("feature", LogEntry::new("fork", "dev")).unwrap();
        snap_lane(&mgr, "feature", "comp1", "c");

        let diff = mgr.diff_status("feature", Some("stage")).unwrap();
        assert_eq!(diff.baseline, "stage");
        let c = diff.component(&comp("comp1")).unwrap();
        assert_eq!(c.change_type, ChangeType::Ahead);
        assert!(c.up_to_date);
    }
}
