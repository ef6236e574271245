//! Reconciling one lane (or main) into the active history.
//!
//! Per component the outcome is one of: nothing to do, fast-forward, a new
//! two-parent merge version, or a conflict. File contents are never merged
//! textually; each path takes whichever side changed it relative to the
//! merge base, and a path both sides changed differently is a conflict unless
//! a [`MergeStrategy`] picks a side.

use std::collections::{BTreeMap, BTreeSet};

use cvc_model::{Component, LaneOperation, LogEntry, Version};
use cvc_refs::{component_ref, Head, RefUpdate};
use cvc_sources::StagedCommit;
use cvc_types::{ComponentId, ObjectId, MAIN_LANE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LaneError, LaneResult};
use crate::manager::LaneManager;

/// Which side wins a path both sides changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Keep the target's content.
    Ours,
    /// Take the incoming content.
    Theirs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeOutcome {
    /// The target already contains the incoming head.
    UpToDate,
    /// The target head is an ancestor of the incoming head.
    FastForward,
    /// Both sides moved; a merge version joins them.
    Merged,
    /// Both sides changed the same path differently.
    Conflict,
    /// The component is new to the target.
    Added,
}

/// Merge result for one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMerge {
    pub id: ComponentId,
    pub outcome: MergeOutcome,
    pub incoming: ObjectId,
    pub target: Option<ObjectId>,
    /// The target's head after the merge. `None` for conflicts.
    pub result: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

/// Merge result for a whole lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub from: String,
    pub into: String,
    pub components: Vec<ComponentMerge>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        self.components
            .iter()
            .any(|c| c.outcome == MergeOutcome::Conflict)
    }

    pub fn component(&self, id: &ComponentId) -> Option<&ComponentMerge> {
        self.components.iter().find(|c| c.id.same_component(id))
    }

    /// Components whose target head changes.
    pub fn changed(&self) -> impl Iterator<Item = &ComponentMerge> {
        self.components.iter().filter(|c| {
            matches!(
                c.outcome,
                MergeOutcome::FastForward | MergeOutcome::Merged | MergeOutcome::Added
            )
        })
    }
}

/// A planned merge version, not yet persisted.
struct PendingMerge {
    version: Version,
    version_id: ObjectId,
}

impl LaneManager {
    /// What merging `from` into `into` (default: the active history) would
    /// do. Writes nothing.
    pub fn merge_status(&self, from: &str, into: Option<&str>) -> LaneResult<MergeReport> {
        let into = match into {
            Some(name) => name.to_string(),
            None => self.current_head()?.name(),
        };
        let (report, _) = self.plan_merge(from, &into, None, &LogEntry::new("merge status", ""))?;
        Ok(report)
    }

    /// Merge `from` into the active history.
    ///
    /// Any unresolved conflict fails the whole merge before anything is
    /// written. On a lane target, a `merge` history entry is appended.
    pub fn merge_lane(
        &self,
        from: &str,
        strategy: Option<MergeStrategy>,
        log: LogEntry,
    ) -> LaneResult<MergeReport> {
        let head = self.current_head()?;
        let into = head.name();
        let (report, pending) = self.plan_merge(from, &into, strategy, &log)?;
        if let Some(conflict) = report
            .components
            .iter()
            .find(|c| c.outcome == MergeOutcome::Conflict)
        {
            return Err(LaneError::Conflict {
                component: conflict.id.clone(),
                files: conflict.conflicts.clone(),
            });
        }
        if report.changed().next().is_none() {
            debug!(from, into = %into, "nothing to merge");
            return Ok(report);
        }

        let mut staged = StagedCommit::new();
        for merge in &pending {
            staged.stage(merge.version.to_stored_object()?);
        }

        match &head {
            Head::Main => {
                for change in report.changed() {
                    let (record_id, component) = self.sources().find_or_add_component(&change.id)?;
                    let Some(result) = change.result else { continue };
                    let sequence = self.sequence_of(&pending, &result)?;
                    let next = component.advance(result, sequence, None);
                    let next_record = staged.stage(next.to_stored_object()?);
                    staged.update_ref(RefUpdate::swap(
                        component_ref(&change.id),
                        Some(record_id),
                        next_record,
                    ));
                }
            }
            Head::Lane(lane_id) => {
                let current = self.load_lane(lane_id)?;
                let mut next = current.lane.next_state(log.clone());
                let mut rendered = Vec::new();
                for change in report.changed() {
                    let Some(result) = change.result else { continue };
                    next.set_head(change.id.clone(), result);
                    let label = match pending.iter().find(|p| p.version_id == result) {
                        Some(p) => p.version.label(&result),
                        None => self.version_label(&result)?,
                    };
                    rendered.push(format!("{}@{label}", change.id));
                }
                self.stage_lane_state(
                    &mut staged,
                    Some(&current),
                    &next,
                    LaneOperation::Merge,
                    Some(format!("merge {from}")),
                    rendered,
                )?;
            }
        }
        staged.commit(self.objects(), self.refs())?;

        info!(
            from,
            into = %into,
            changed = report.changed().count(),
            merged = pending.len(),
            "lane merged"
        );
        Ok(report)
    }

    fn sequence_of(&self, pending: &[PendingMerge], id: &ObjectId) -> LaneResult<u64> {
        match pending.iter().find(|p| p.version_id == *id) {
            Some(p) => Ok(p.version.sequence),
            None => Ok(self.sources().load_version(id)?.sequence),
        }
    }

    /// Heads of every component in a history: main or a lane.
    fn heads_of(&self, name: &str) -> LaneResult<BTreeMap<String, (ComponentId, ObjectId)>> {
        if name == MAIN_LANE {
            return Ok(self
                .main_heads()?
                .into_iter()
                .map(|(id, head)| (id.key(), (id, head)))
                .collect());
        }
        let state = self.load_lane(&Self::parse_lane(name)?)?;
        Ok(state
            .lane
            .components
            .into_iter()
            .map(|(key, c)| (key, (c.id, c.head)))
            .collect())
    }

    fn plan_merge(
        &self,
        from: &str,
        into: &str,
        strategy: Option<MergeStrategy>,
        log: &LogEntry,
    ) -> LaneResult<(MergeReport, Vec<PendingMerge>)> {
        let incoming = self.heads_of(from)?;
        let target = self.heads_of(into)?;
        let graph = self.sources().graph();

        let mut components = Vec::with_capacity(incoming.len());
        let mut pending = Vec::new();
        for (key, (id, theirs)) in incoming {
            let ours = target.get(&key).map(|(_, head)| *head);
            let mut entry = ComponentMerge {
                id: id.clone(),
                outcome: MergeOutcome::UpToDate,
                incoming: theirs,
                target: ours,
                result: ours,
                conflicts: Vec::new(),
            };
            match ours {
                None => {
                    entry.outcome = MergeOutcome::Added;
                    entry.result = Some(theirs);
                }
                Some(ours) if graph.is_ancestor(&theirs, &ours)? => {}
                Some(ours) if graph.is_ancestor(&ours, &theirs)? => {
                    entry.outcome = MergeOutcome::FastForward;
                    entry.result = Some(theirs);
                }
                Some(ours) => {
                    let base = graph.merge_base(&ours, &theirs)?;
                    let ours_v = graph.load_version(&ours)?;
                    let theirs_v = graph.load_version(&theirs)?;
                    let base_files = match base {
                        Some(b) => graph.load_version(&b)?.files,
                        None => BTreeMap::new(),
                    };
                    let (files, conflicts) =
                        merge_files(&base_files, &ours_v.files, &theirs_v.files, strategy);
                    if !conflicts.is_empty() {
                        entry.outcome = MergeOutcome::Conflict;
                        entry.result = None;
                        entry.conflicts = conflicts;
                    } else {
                        let component = match self.sources().get_component(&id)? {
                            Some((_, c)) => c,
                            None => Component::new(id.clone()),
                        };
                        let parents = vec![ours, theirs];
                        let sequence = self.sources().next_sequence(&component, &parents)?;
                        let version = Version {
                            component: ours_v.component.clone(),
                            sequence,
                            tag: None,
                            parents,
                            files,
                            dependencies: ours_v.dependencies.clone(),
                            policy: ours_v.policy.clone(),
                            log: log.clone(),
                            build_status: Default::default(),
                            extensions: ours_v.extensions.clone(),
                        };
                        let version_id = version.id()?;
                        entry.outcome = MergeOutcome::Merged;
                        entry.result = Some(version_id);
                        pending.push(PendingMerge {
                            version,
                            version_id,
                        });
                    }
                }
            }
            components.push(entry);
        }

        Ok((
            MergeReport {
                from: from.to_string(),
                into: into.to_string(),
                components,
            },
            pending,
        ))
    }
}

/// Whole-file three-way merge of path → source maps. Returns the merged map
/// and the conflicting paths.
fn merge_files(
    base: &BTreeMap<String, ObjectId>,
    ours: &BTreeMap<String, ObjectId>,
    theirs: &BTreeMap<String, ObjectId>,
    strategy: Option<MergeStrategy>,
) -> (BTreeMap<String, ObjectId>, Vec<String>) {
    let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    let mut merged = BTreeMap::new();
    let mut conflicts = Vec::new();
    for path in paths {
        let (b, o, t) = (base.get(path), ours.get(path), theirs.get(path));
        let pick = if o == t || t == b {
            o
        } else if o == b {
            t
        } else {
            match strategy {
                Some(MergeStrategy::Ours) => o,
                Some(MergeStrategy::Theirs) => t,
                None => {
                    conflicts.push(path.clone());
                    continue;
                }
            }
        };
        if let Some(id) = pick {
            merged.insert(path.clone(), *id);
        }
    }
    (merged, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{comp, manager, snap_lane, snap_lane_files, snap_main};
    use cvc_sources::{FileMap, SourceInput};
    use cvc_types::LaneId;

    fn two_files(a: &str, b: &str) -> FileMap {
        [
            ("a.ts".to_string(), a.as_bytes().to_vec()),
            ("b.ts".to_string(), b.as_bytes().to_vec()),
        ]
        .into()
    }

    fn main_files(mgr: &LaneManager, name: &str, files: FileMap) -> ObjectId {
        mgr.sources()
            .add_source(SourceInput {
                id: comp(name),
                files,
                log: LogEntry::new("snap", "dev"),
            })
            .unwrap()
            .version_id
    }

    fn log() -> LogEntry {
        LogEntry::new("merge", "dev")
    }

    // ---------------------------------------------------------------
    // merge_files
    // ---------------------------------------------------------------

    #[test]
    fn merge_files_takes_each_sides_changes() {
        let id = |s: &str| ObjectId::from_bytes(s.as_bytes());
        let base: BTreeMap<_, _> = [("a".to_string(), id("1")), ("b".to_string(), id("1"))].into();
        let ours: BTreeMap<_, _> = [("a".to_string(), id("2")), ("b".to_string(), id("1"))].into();
        let theirs: BTreeMap<_, _> =
            [("a".to_string(), id("1")), ("b".to_string(), id("3"))].into();
        let (merged, conflicts) = merge_files(&base, &ours, &theirs, None);
        assert!(conflicts.is_empty());
        assert_eq!(merged["a"], id("2"));
        assert_eq!(merged["b"], id("3"));
    }

    #[test]
    fn merge_files_honours_deletions() {
        let id = |s: &str| ObjectId::from_bytes(s.as_bytes());
        let base: BTreeMap<_, _> = [("a".to_string(), id("1"))].into();
        let ours = BTreeMap::new();
        let theirs = base.clone();
        let (merged, conflicts) = merge_files(&base, &ours, &theirs, None);
        assert!(conflicts.is_empty());
        assert!(merged.is_empty());
    }

    #[test]
    fn merge_files_conflict_and_strategies() {
        let id = |s: &str| ObjectId::from_bytes(s.as_bytes());
        let base: BTreeMap<_, _> = [("a".to_string(), id("1"))].into();
        let ours: BTreeMap<_, _> = [("a".to_string(), id("2"))].into();
        let theirs: BTreeMap<_, _> = [("a".to_string(), id("3"))].into();
        let (_, conflicts) = merge_files(&base, &ours, &theirs, None);
        assert_eq!(conflicts, vec!["a".to_string()]);
        let (merged, _) = merge_files(&base, &ours, &theirs, Some(MergeStrategy::Ours));
        assert_eq!(merged["a"], id("2"));
        let (merged, _) = merge_files(&base, &ours, &theirs, Some(MergeStrategy::Theirs));
        assert_eq!(merged["a"], id("3"));
    }

    // ---------------------------------------------------------------
    // merge_lane
    // ---------------------------------------------------------------

    #[test]
    fn lane_into_main_fast_forwards() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
        let on_lane = snap_lane(&mgr, "stage", "comp1", "b");
        mgr.switch_lanes("main").unwrap();

        let report = mgr.merge_lane("stage", None, log()).unwrap();
        assert_eq!(report.into, "main");
        assert_eq!(
            report.component(&comp("comp1")).unwrap().outcome,
            MergeOutcome::FastForward
        );
        assert_eq!(mgr.main_head(&comp("comp1")).unwrap(), Some(on_lane));
    }

    #[test]
    fn merging_twice_is_up_to_date() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
        snap_lane(&mgr, "stage", "comp1", "b");
        mgr.switch_lanes("main").unwrap();
        mgr.merge_lane("stage", None, log()).unwrap();

        let report = mgr.merge_lane("stage", None, log()).unwrap();
        assert_eq!(
            report.component(&comp("comp1")).unwrap().outcome,
            MergeOutcome::UpToDate
        );
    }

    #[test]
    fn diverged_histories_get_a_two_parent_version() {
        let mgr = manager(false);
        main_files(&mgr, "comp1", two_files("a1", "b1"));
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
        let lane_head = snap_lane_files(&mgr, "stage", "comp1", two_files("a1", "b2"));
        mgr.switch_lanes("main").unwrap();
        let main_head = main_files(&mgr, "comp1", two_files("a2", "b1"));

        let report = mgr.merge_lane("stage", None, log()).unwrap();
        let merged = report.component(&comp("comp1")).unwrap();
        assert_eq!(merged.outcome, MergeOutcome::Merged);

        let head = mgr.main_head(&comp("comp1")).unwrap().unwrap();
        assert_eq!(Some(head), merged.result);
        let version = mgr.sources().load_version(&head).unwrap();
        assert_eq!(version.parents, vec![main_head, lane_head]);
        let files = mgr.sources().read_files(&version).unwrap();
        assert_eq!(files["a.ts"], b"a2".to_vec());
        assert_eq!(files["b.ts"], b"b2".to_vec());
        assert!(mgr.sources().graph().is_ancestor(&lane_head, &head).unwrap());
    }

    #[test]
    fn conflict_without_strategy_writes_nothing() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
        snap_lane(&mgr, "stage", "comp1", "lane");
        mgr.switch_lanes("main").unwrap();
        let main_head = snap_main(&mgr, "comp1", "main");

        let status = mgr.merge_status("stage", None).unwrap();
        assert!(status.has_conflicts());

        let err = mgr.merge_lane("stage", None, log()).unwrap_err();
        match err {
            LaneError::Conflict { component, files } => {
                assert_eq!(component, comp("comp1"));
                assert_eq!(files, vec!["index.ts".to_string()]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(mgr.main_head(&comp("comp1")).unwrap(), Some(main_head));
    }

    #[test]
    fn theirs_strategy_resolves_conflict() {
        let mgr = manager(false);
        snap_main(&mgr, "comp1", "a");
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
        snap_lane(&mgr, "stage", "comp1", "lane");
        mgr.switch_lanes("main").unwrap();
        snap_main(&mgr, "comp1", "main");

        mgr.merge_lane("stage", Some(MergeStrategy::Theirs), log()).unwrap();
        let head = mgr.main_head(&comp("comp1")).unwrap().unwrap();
        let version = mgr.sources().load_version(&head).unwrap();
        let files = mgr.sources().read_files(&version).unwrap();
        assert_eq!(files["index.ts"], b"lane".to_vec());
    }

    #[test]
    fn main_into_lane_records_merge_history() {
        let mgr = manager(true);
        snap_main(&mgr, "comp1", "a");
        mgr.create_lane("stage", LogEntry::new("create", "dev")).unwrap();
        mgr.switch_lanes("main").unwrap();
        let newer = snap_main(&mgr, "comp2", "new component");
        mgr.switch_lanes("stage").unwrap();

        let report = mgr.merge_lane("main", None, log()).unwrap();
        assert_eq!(
            report.component(&comp("comp2")).unwrap().outcome,
            MergeOutcome::Added
        );
        let stage = LaneId::new("stage").unwrap();
        let lane = mgr.load_lane(&stage).unwrap();
        assert_eq!(lane.lane.head_of(&comp("comp2")), Some(newer));

        let history = mgr.get_lane_history(&stage).unwrap();
        let last = history.latest().unwrap();
        assert_eq!(last.operation, LaneOperation::Merge);
        assert_eq!(last.message.as_deref(), Some("merge main"));
    }
}
