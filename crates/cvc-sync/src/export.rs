use std::collections::{BTreeMap, BTreeSet, HashSet};

use cvc_lanes::{LaneManager, LaneState};
use cvc_model::{Component, Lane, LaneComponent, LaneHistory, Version};
use cvc_refs::{component_ref, lane_history_ref, lane_ref, Head, RefUpdate};
use cvc_sources::StagedCommit;
use cvc_store::StoredObject;
use cvc_types::{ComponentId, LaneId, ObjectId};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteScope;
use crate::types::{ExportRequest, ExportResult, ExportedComponent};
use crate::verifier::fetch_verified;

/// Qualifies components with a remote scope and pushes them there.
#[derive(Clone)]
pub struct Exporter {
    lanes: LaneManager,
}

/// A component selected for export and the record it is exported from.
struct Selected {
    record_id: Option<ObjectId>,
    component: Component,
}

/// A lane selected for export, with its history if it records one.
struct SelectedLane {
    state: LaneState,
    history: Option<(ObjectId, LaneHistory)>,
}

/// Rewritten objects and where they came from.
#[derive(Default)]
struct Rewritten {
    versions: BTreeMap<ObjectId, ObjectId>,
    objects: BTreeMap<ObjectId, StoredObject>,
}

impl Exporter {
    pub fn new(lanes: LaneManager) -> Self {
        Self { lanes }
    }

    /// Export components, and lanes with their history, to `remote`.
    ///
    /// Remote refs only move forward: a remote head that is not part of the
    /// exported history fails the export with `NotFastForward`. Local refs
    /// are switched to the rewritten objects only after the remote accepted
    /// every ref update.
    pub async fn export(
        &self,
        remote: &dyn RemoteScope,
        request: &ExportRequest,
    ) -> SyncResult<ExportResult> {
        let scope = remote.name().to_string();
        validate_scope(&scope)?;
        if request.ids.is_empty() && request.lanes.is_empty() {
            return Err(SyncError::Validation("nothing to export".into()));
        }

        let lanes = self.select_lanes(&scope, &request.lanes)?;
        let components = self.select_components(&scope, &request.ids, &lanes)?;
        let qualified = self.qualified_keys(&scope, &components)?;
        let scoper = Scoper {
            scope: &scope,
            qualified: &qualified,
        };

        let roots = self.roots(&components, &lanes)?;
        let versions = self.collect_versions(roots, &scoper)?;
        let mut rewritten = self.rewrite_versions(&versions, &scoper)?;
        let sources = self.sources_of(&versions)?;

        let mut records = BTreeMap::new();
        for (key, selected) in &components {
            let record = rewrite_component(&selected.component, &scoper, &rewritten.versions);
            let object = record.to_stored_object()?;
            let id = object.compute_id();
            rewritten.objects.insert(id, object);
            records.insert(key.clone(), (id, record));
        }

        let mut exported_lanes = Vec::new();
        for selected in &lanes {
            let exported = self.rewrite_lane(selected, &scoper, &mut rewritten)?;
            exported_lanes.push(exported);
        }

        // Push objects first, refs second.
        let mut outgoing: Vec<ObjectId> = rewritten.objects.keys().copied().collect();
        outgoing.extend(sources.keys().copied());
        let missing = remote.missing_objects(&outgoing).await?;
        let to_send: Vec<StoredObject> = missing
            .iter()
            .filter_map(|id| rewritten.objects.get(id).or_else(|| sources.get(id)).cloned())
            .collect();
        remote.push_objects(&to_send).await?;
        debug!(scope = %scope, sent = to_send.len(), offered = outgoing.len(), "pushed objects");

        let new_versions: HashSet<ObjectId> = rewritten.versions.values().copied().collect();
        let updates = self
            .remote_updates(remote, &records, &exported_lanes, &new_versions)
            .await?;
        let rejected = remote.update_refs(&updates).await?;
        if let Some(first) = rejected.into_iter().next() {
            return Err(SyncError::RefRejected {
                name: first.name,
                reason: first.reason,
            });
        }

        self.switch_local(&components, &records, &lanes, &exported_lanes, rewritten.objects)?;

        let result = ExportResult {
            scope: scope.clone(),
            components: components
                .iter()
                .filter_map(|(key, selected)| {
                    let (_, record) = records.get(key)?;
                    Some(ExportedComponent {
                        previous_id: selected.component.id.clone(),
                        id: record.id.clone(),
                        head: record.head,
                    })
                })
                .collect(),
            lanes: exported_lanes.iter().map(|l| l.lane.id.clone()).collect(),
            rewritten: rewritten.versions,
            objects_sent: to_send.len(),
        };
        info!(
            scope = %scope,
            components = result.components.len(),
            lanes = result.lanes.len(),
            sent = result.objects_sent,
            "exported"
        );
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------

    fn select_lanes(&self, scope: &str, ids: &[LaneId]) -> SyncResult<Vec<SelectedLane>> {
        let mut selected = Vec::new();
        for id in ids {
            if let Some(other) = id.scope().filter(|s| *s != scope) {
                return Err(SyncError::Validation(format!(
                    "lane {id} belongs to scope {other} and cannot be exported to {scope}"
                )));
            }
            let state = self.lanes.load_lane(id)?;
            let refs = self.lanes.sources().refs();
            let history = match refs.read_ref(&lane_history_ref(id))? {
                Some(history_id) => {
                    let obj = self.lanes.sources().objects().get(&history_id)?;
                    Some((history_id, LaneHistory::from_stored_object(&obj)?))
                }
                None => None,
            };
            selected.push(SelectedLane { state, history });
        }
        Ok(selected)
    }

    fn select_components(
        &self,
        scope: &str,
        ids: &[ComponentId],
        lanes: &[SelectedLane],
    ) -> SyncResult<BTreeMap<String, Selected>> {
        let sources = self.lanes.sources();
        let mut selected = BTreeMap::new();
        for id in ids {
            let (record_id, component) = sources.load_component(id)?;
            selected.insert(
                id.key(),
                Selected {
                    record_id: Some(record_id),
                    component,
                },
            );
        }
        for lane in lanes {
            for entry in lane.state.lane.components.values() {
                if selected.contains_key(&entry.id.key()) {
                    continue;
                }
                let selection = match sources.get_component(&entry.id)? {
                    Some((record_id, component)) => Selected {
                        record_id: Some(record_id),
                        component,
                    },
                    None => Selected {
                        record_id: None,
                        component: Component::new(entry.id.clone()),
                    },
                };
                selected.insert(entry.id.key(), selection);
            }
        }
        for selection in selected.values() {
            let id = &selection.component.id;
            if let Some(other) = id.scope().filter(|s| *s != scope) {
                return Err(SyncError::Validation(format!(
                    "component {id} belongs to scope {other} and cannot be exported to {scope}"
                )));
            }
        }
        Ok(selected)
    }

    /// Keys whose ids carry `scope` after export: the exported components
    /// and any component a previous export already qualified.
    fn qualified_keys(
        &self,
        scope: &str,
        components: &BTreeMap<String, Selected>,
    ) -> SyncResult<BTreeSet<String>> {
        let mut qualified: BTreeSet<String> = components.keys().cloned().collect();
        for component in self.lanes.sources().list_components()? {
            if component.id.scope() == Some(scope) {
                qualified.insert(component.key());
            }
        }
        Ok(qualified)
    }

    // ---------------------------------------------------------------
    // History rewrite
    // ---------------------------------------------------------------

    /// Every version an exported ref can reach: component heads and tags,
    /// lane heads, and the heads of every recorded lane state.
    fn roots(
        &self,
        components: &BTreeMap<String, Selected>,
        lanes: &[SelectedLane],
    ) -> SyncResult<Vec<ObjectId>> {
        let mut roots = Vec::new();
        for selected in components.values() {
            roots.extend(selected.component.head);
            roots.extend(selected.component.tags.values().copied());
        }
        for lane in lanes {
            roots.extend(lane.state.lane.components.values().map(|c| c.head));
            if let Some((_, history)) = &lane.history {
                for entry in &history.entries {
                    let past = self.lanes.lane_by_hash(&entry.lane_state)?;
                    roots.extend(past.components.values().map(|c| c.head));
                }
            }
        }
        Ok(roots)
    }

    fn collect_versions(
        &self,
        roots: Vec<ObjectId>,
        scoper: &Scoper<'_>,
    ) -> SyncResult<BTreeMap<ObjectId, Version>> {
        let sources = self.lanes.sources();
        let mut versions = BTreeMap::new();
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if versions.contains_key(&id) {
                continue;
            }
            let version = sources.load_version(&id)?;
            for dep in &version.dependencies {
                if dep.id.scope().is_none() && !scoper.qualified.contains(&dep.id.key()) {
                    return Err(SyncError::Validation(format!(
                        "{} depends on {} which is not exported; export it together with {} or first",
                        version.component,
                        dep.id,
                        version.component.key()
                    )));
                }
            }
            stack.extend(version.parents.iter().copied());
            for snap in snap_references(&version) {
                if sources.objects().exists(&snap)? {
                    stack.push(snap);
                }
            }
            versions.insert(id, version);
        }
        debug!(count = versions.len(), "collected history for export");
        Ok(versions)
    }

    fn rewrite_versions(
        &self,
        versions: &BTreeMap<ObjectId, Version>,
        scoper: &Scoper<'_>,
    ) -> SyncResult<Rewritten> {
        let mut out = Rewritten::default();
        for old in topo_order(versions) {
            let version = &versions[&old];
            let rewritten = scoper.rewrite_version(version, &out.versions);
            let object = rewritten.to_stored_object()?;
            let new = object.compute_id();
            out.versions.insert(old, new);
            out.objects.insert(new, object);
        }
        Ok(out)
    }

    fn sources_of(
        &self,
        versions: &BTreeMap<ObjectId, Version>,
    ) -> SyncResult<BTreeMap<ObjectId, StoredObject>> {
        let store = self.lanes.sources().objects();
        let mut sources = BTreeMap::new();
        for version in versions.values() {
            for id in version.files.values() {
                if !sources.contains_key(id) {
                    sources.insert(*id, store.get(id)?);
                }
            }
        }
        Ok(sources)
    }

    fn rewrite_lane(
        &self,
        selected: &SelectedLane,
        scoper: &Scoper<'_>,
        rewritten: &mut Rewritten,
    ) -> SyncResult<ExportedLane> {
        let lane = scoper.rewrite_lane(&selected.state.lane, &rewritten.versions);
        let object = lane.to_stored_object()?;
        let state_id = object.compute_id();
        rewritten.objects.insert(state_id, object);

        let history = match &selected.history {
            Some((_, history)) => {
                let renames = scoper.renames(&rewritten.versions);
                let mut next = LaneHistory::new(lane.id.clone());
                for entry in &history.entries {
                    let past = self.lanes.lane_by_hash(&entry.lane_state)?;
                    let past = scoper.rewrite_lane(&past, &rewritten.versions);
                    let past_object = past.to_stored_object()?;
                    let past_id = past_object.compute_id();
                    rewritten.objects.insert(past_id, past_object);
                    let components = entry
                        .components
                        .iter()
                        .map(|c| renames.rename(c))
                        .collect();
                    next.append(
                        past_id,
                        entry.operation,
                        entry.message.clone(),
                        components,
                        entry.timestamp,
                    )?;
                }
                let object = next.to_stored_object()?;
                let history_id = object.compute_id();
                rewritten.objects.insert(history_id, object);
                Some(history_id)
            }
            None => None,
        };
        Ok(ExportedLane {
            state_id,
            lane,
            history,
        })
    }

    // ---------------------------------------------------------------
    // Refs
    // ---------------------------------------------------------------

    async fn remote_updates(
        &self,
        remote: &dyn RemoteScope,
        records: &BTreeMap<String, (ObjectId, Component)>,
        lanes: &[ExportedLane],
        new_versions: &HashSet<ObjectId>,
    ) -> SyncResult<Vec<RefUpdate>> {
        let current: BTreeMap<String, ObjectId> =
            remote.list_refs("refs/").await?.into_iter().collect();
        let mut updates = Vec::new();

        for (record_id, record) in records.values() {
            let name = component_ref(&record.id);
            let existing = current.get(&name).copied();
            if existing == Some(*record_id) {
                continue;
            }
            if let Some(existing) = existing {
                let (objects, _) = fetch_verified(remote, &[existing]).await?;
                let theirs = Component::from_stored_object(&objects[&existing])?;
                if theirs.head.is_some_and(|h| !new_versions.contains(&h)) {
                    return Err(SyncError::NotFastForward(name));
                }
            }
            updates.push(RefUpdate::swap(name, existing, *record_id));
        }

        for lane in lanes {
            let name = lane_ref(&lane.lane.id);
            let existing = current.get(&name).copied();
            if existing != Some(lane.state_id) {
                if let Some(existing) = existing {
                    let (objects, _) = fetch_verified(remote, &[existing]).await?;
                    let theirs = Lane::from_stored_object(&objects[&existing])?;
                    if theirs.components.values().any(|c| !new_versions.contains(&c.head)) {
                        return Err(SyncError::NotFastForward(name));
                    }
                }
                updates.push(RefUpdate::swap(name, existing, lane.state_id));
            }
            if let Some(history_id) = lane.history {
                let name = lane_history_ref(&lane.lane.id);
                let existing = current.get(&name).copied();
                if existing != Some(history_id) {
                    updates.push(RefUpdate::swap(name, existing, history_id));
                }
            }
        }
        Ok(updates)
    }

    /// Point local refs at the rewritten objects. Exported lanes move to
    /// their scoped name, taking HEAD with them.
    fn switch_local(
        &self,
        components: &BTreeMap<String, Selected>,
        records: &BTreeMap<String, (ObjectId, Component)>,
        lanes: &[SelectedLane],
        exported: &[ExportedLane],
        objects: BTreeMap<ObjectId, StoredObject>,
    ) -> SyncResult<()> {
        let sources = self.lanes.sources();
        let refs = sources.refs();
        let mut staged = StagedCommit::new();
        for object in objects.into_values() {
            staged.stage(object);
        }

        for (key, selected) in components {
            let Some((record_id, record)) = records.get(key) else {
                continue;
            };
            if selected.record_id != Some(*record_id) {
                let name = component_ref(&record.id);
                staged.update_ref(RefUpdate::swap(name, selected.record_id, *record_id));
            }
        }

        let mut moved_head = None;
        for (before, after) in lanes.iter().zip(exported) {
            let old_id = before.state.id();
            let new_id = &after.lane.id;
            if old_id == new_id {
                staged.update_ref(RefUpdate::swap(
                    lane_ref(new_id),
                    Some(before.state.object_id),
                    after.state_id,
                ));
            } else {
                staged.update_ref(RefUpdate::delete(lane_ref(old_id), before.state.object_id));
                let existing = refs.read_ref(&lane_ref(new_id))?;
                staged.update_ref(RefUpdate::swap(lane_ref(new_id), existing, after.state_id));
                if refs.head()? == Head::Lane(old_id.clone()) {
                    moved_head = Some(Head::Lane(new_id.clone()));
                }
            }
            if let (Some((old_history, _)), Some(new_history)) = (&before.history, after.history) {
                if old_id == new_id {
                    let name = lane_history_ref(new_id);
                    staged.update_ref(RefUpdate::swap(name, Some(*old_history), new_history));
                } else {
                    staged.update_ref(RefUpdate::delete(lane_history_ref(old_id), *old_history));
                    let existing = refs.read_ref(&lane_history_ref(new_id))?;
                    let name = lane_history_ref(new_id);
                    staged.update_ref(RefUpdate::swap(name, existing, new_history));
                }
            }
        }

        staged.commit(sources.objects(), refs)?;
        if let Some(head) = moved_head {
            refs.set_head(&head)?;
        }
        Ok(())
    }
}

struct ExportedLane {
    state_id: ObjectId,
    lane: Lane,
    history: Option<ObjectId>,
}

/// Applies the scope to ids and remaps version references.
struct Scoper<'a> {
    scope: &'a str,
    qualified: &'a BTreeSet<String>,
}

impl Scoper<'_> {
    fn component(&self, id: &ComponentId) -> ComponentId {
        if id.scope().is_none() && self.qualified.contains(&id.key()) {
            id.with_scope(self.scope)
        } else {
            id.clone()
        }
    }

    fn lane(&self, id: &LaneId) -> LaneId {
        match id.scope() {
            Some(_) => id.clone(),
            None => id.with_scope(self.scope),
        }
    }

    fn rewrite_version(&self, version: &Version, map: &BTreeMap<ObjectId, ObjectId>) -> Version {
        let mut out = version.clone();
        out.component = self.component(&version.component);
        out.parents = version.parents.iter().map(|p| remap(map, p)).collect();
        for dep in &mut out.dependencies {
            dep.id = self.component(&dep.id);
            if let Some(old) = parse_snap_label(&dep.version) {
                dep.version = remap(map, &old).to_hex();
            }
        }
        out
    }

    fn rewrite_lane(&self, lane: &Lane, map: &BTreeMap<ObjectId, ObjectId>) -> Lane {
        let mut out = lane.clone();
        out.id = self.lane(&lane.id);
        out.components = lane
            .components
            .iter()
            .map(|(key, c)| {
                let entry = LaneComponent {
                    id: self.component(&c.id),
                    head: remap(map, &c.head),
                };
                (key.clone(), entry)
            })
            .collect();
        out
    }

    fn renames<'m>(&self, map: &'m BTreeMap<ObjectId, ObjectId>) -> Renames<'m> {
        let ids = self
            .qualified
            .iter()
            .map(|key| (key.clone(), format!("{}/{key}", self.scope)))
            .collect();
        Renames { ids, versions: map }
    }
}

/// Rewrites `id@version` strings recorded in lane history.
struct Renames<'m> {
    ids: BTreeMap<String, String>,
    versions: &'m BTreeMap<ObjectId, ObjectId>,
}

impl Renames<'_> {
    fn rename(&self, rendered: &str) -> String {
        let Some((id, label)) = rendered.rsplit_once('@') else {
            return rendered.to_string();
        };
        let id = self.ids.get(id).map(String::as_str).unwrap_or(id);
        let label = match parse_snap_label(label) {
            Some(old) => remap(self.versions, &old).to_hex(),
            None => label.to_string(),
        };
        format!("{id}@{label}")
    }
}

fn rewrite_component(
    component: &Component,
    scoper: &Scoper<'_>,
    map: &BTreeMap<ObjectId, ObjectId>,
) -> Component {
    Component {
        id: scoper.component(&component.id),
        head: component.head.map(|h| remap(map, &h)),
        tags: component
            .tags
            .iter()
            .map(|(tag, v)| (tag.clone(), remap(map, v)))
            .collect(),
        last_sequence: component.last_sequence,
    }
}

fn remap(map: &BTreeMap<ObjectId, ObjectId>, id: &ObjectId) -> ObjectId {
    map.get(id).copied().unwrap_or(*id)
}

fn parse_snap_label(label: &str) -> Option<ObjectId> {
    if ObjectId::is_hex_id(label) {
        ObjectId::from_hex(label).ok()
    } else {
        None
    }
}

/// Versions a version points at by snap label.
fn snap_references(version: &Version) -> impl Iterator<Item = ObjectId> + '_ {
    version
        .dependencies
        .iter()
        .filter_map(|d| parse_snap_label(&d.version))
}

/// Versions ordered so that parents and referenced snaps come first.
fn topo_order(versions: &BTreeMap<ObjectId, Version>) -> Vec<ObjectId> {
    let mut order = Vec::with_capacity(versions.len());
    let mut done = HashSet::new();
    for root in versions.keys() {
        let mut stack = vec![(*root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                if done.insert(id) {
                    order.push(id);
                }
                continue;
            }
            if done.contains(&id) {
                continue;
            }
            stack.push((id, true));
            let version = &versions[&id];
            let edges = version.parents.iter().copied().chain(snap_references(version));
            for next in edges {
                if versions.contains_key(&next) && !done.contains(&next) {
                    stack.push((next, false));
                }
            }
        }
    }
    order
}

fn validate_scope(scope: &str) -> SyncResult<()> {
    let forbidden = |c: char| {
        c.is_whitespace() || c.is_control() || matches!(c, '/' | '@' | ':' | '\\' | '*')
    };
    let bad = scope.is_empty()
        || scope == cvc_types::MAIN_LANE
        || scope.contains("..")
        || scope.chars().any(forbidden);
    if bad {
        return Err(SyncError::Validation(format!("invalid scope name {scope:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRemote;
    use crate::tests::{comp, fixture, snap_main, tag_main, Fixture};
    use cvc_model::{ComponentDependency, DependencyLifecycle, LogEntry};
    use cvc_refs::RefStore;

    // ---------------------------------------------------------------
    // Scope rewrite
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn export_scopes_and_rehashes_history() {
        let fx = fixture(false);
        let v1 = snap_main(&fx, "ui/button", "one", &[]);
        let v2 = snap_main(&fx, "ui/button", "two", &[]);
        let remote = InMemoryRemote::new("org.remote");

        let result = fx
            .exporter()
            .export(&remote, &ExportRequest::components([comp("ui/button")]))
            .await
            .unwrap();

        let exported = result.component("ui/button").unwrap();
        assert_eq!(exported.id.to_string(), "org.remote/ui/button");
        assert!(!exported.previous_id.is_scoped());
        let new_v1 = result.rewritten[&v1];
        let new_v2 = result.rewritten[&v2];
        assert_ne!(new_v1, v1);
        assert_eq!(exported.head, Some(new_v2));

        let head = fx.sources().load_version(&new_v2).unwrap();
        assert_eq!(head.component.scope(), Some("org.remote"));
        assert_eq!(head.parents, vec![new_v1]);
        assert_eq!(head.sequence, 2);
    }

    #[tokio::test]
    async fn export_updates_local_and_remote_refs() {
        let fx = fixture(false);
        snap_main(&fx, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");

        let result = fx
            .exporter()
            .export(&remote, &ExportRequest::components([comp("ui/button")]))
            .await
            .unwrap();

        let (local_record, local) = fx.sources().load_component(&comp("ui/button")).unwrap();
        assert_eq!(local.id.scope(), Some("org.remote"));
        let remote_record = remote.refs().read_ref(&component_ref(&local.id)).unwrap();
        assert_eq!(remote_record, Some(local_record));
        assert!(result.objects_sent >= 3);
    }

    #[tokio::test]
    async fn exporting_again_is_a_no_op() {
        let fx = fixture(false);
        snap_main(&fx, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        let request = ExportRequest::components([comp("ui/button")]);

        let first = fx.exporter().export(&remote, &request).await.unwrap();
        let second = fx.exporter().export(&remote, &request).await.unwrap();
        assert_eq!(second.objects_sent, 0);
        assert_eq!(
            first.component("ui/button").unwrap().head,
            second.component("ui/button").unwrap().head
        );
    }

    #[tokio::test]
    async fn snap_labels_of_dependencies_are_remapped() {
        let fx = fixture(false);
        let base = snap_main(&fx, "ui/base", "base", &[]);
        let dep = ComponentDependency {
            id: comp("ui/base"),
            version: base.to_hex(),
            lifecycle: DependencyLifecycle::Runtime,
        };
        let app = snap_main(&fx, "ui/app", "app", &[dep]);
        let remote = InMemoryRemote::new("org.remote");

        let result = fx
            .exporter()
            .export(&remote, &ExportRequest::components([comp("ui/base"), comp("ui/app")]))
            .await
            .unwrap();

        let new_app = fx.sources().load_version(&result.rewritten[&app]).unwrap();
        let dep = &new_app.dependencies[0];
        assert_eq!(dep.id.scope(), Some("org.remote"));
        assert_eq!(dep.version, result.rewritten[&base].to_hex());
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn unexported_unscoped_dependency_is_rejected() {
        let fx = fixture(false);
        tag_main(&fx, "ui/base");
        let dep = ComponentDependency {
            id: comp("ui/base"),
            version: "0.0.1".into(),
            lifecycle: DependencyLifecycle::Runtime,
        };
        snap_main(&fx, "ui/app", "app", &[dep]);
        let remote = InMemoryRemote::new("org.remote");

        let err = fx
            .exporter()
            .export(&remote, &ExportRequest::components([comp("ui/app")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(ref m) if m.contains("ui/base")));
        assert!(remote.objects().is_empty());
        let (_, local) = fx.sources().load_component(&comp("ui/app")).unwrap();
        assert!(!local.id.is_scoped());
    }

    #[tokio::test]
    async fn dependency_exported_earlier_is_accepted() {
        let fx = fixture(false);
        tag_main(&fx, "ui/base");
        let remote = InMemoryRemote::new("org.remote");
        fx.exporter()
            .export(&remote, &ExportRequest::components([comp("ui/base")]))
            .await
            .unwrap();

        let dep = ComponentDependency {
            id: comp("ui/base").with_scope("org.remote"),
            version: "0.0.1".into(),
            lifecycle: DependencyLifecycle::Runtime,
        };
        snap_main(&fx, "ui/app", "app", &[dep]);
        fx.exporter()
            .export(&remote, &ExportRequest::components([comp("ui/app")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn component_of_another_scope_is_rejected() {
        let fx = fixture(false);
        snap_main(&fx, "ui/button", "one", &[]);
        let request = ExportRequest::components([comp("ui/button")]);
        fx.exporter()
            .export(&InMemoryRemote::new("org.first"), &request)
            .await
            .unwrap();

        let err = fx
            .exporter()
            .export(&InMemoryRemote::new("org.second"), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(ref m) if m.contains("org.first")));
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let fx = fixture(false);
        let err = fx
            .exporter()
            .export(&InMemoryRemote::new("org.remote"), &ExportRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn remote_head_outside_exported_history_is_not_fast_forward() {
        let fx = fixture(false);
        snap_main(&fx, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        fx.exporter()
            .export(&remote, &ExportRequest::components([comp("ui/button")]))
            .await
            .unwrap();

        let other = fixture(false);
        snap_main(&other, "ui/button", "unrelated", &[]);
        let err = other
            .exporter()
            .export(&remote, &ExportRequest::components([comp("ui/button")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFastForward(_)));
        let (_, local) = other.sources().load_component(&comp("ui/button")).unwrap();
        assert!(!local.id.is_scoped());
    }

    // ---------------------------------------------------------------
    // Lanes
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn lane_moves_to_scoped_name_with_history() {
        let fx = fixture(true);
        snap_main(&fx, "ui/button", "one", &[]);
        fx.lanes.create_lane("stage", LogEntry::new("", "alice")).unwrap();
        let remote = InMemoryRemote::new("org.remote");

        let stage = LaneId::new("stage").unwrap();
        let result = fx
            .exporter()
            .export(&remote, &ExportRequest::default().with_lane(stage.clone()))
            .await
            .unwrap();

        let scoped = stage.with_scope("org.remote");
        assert_eq!(result.lanes, vec![scoped.clone()]);
        assert!(fx.lanes.lane(&stage).unwrap().is_none());
        let state = fx.lanes.load_lane(&scoped).unwrap();
        let head = state.lane.components.values().next().unwrap().head;
        assert_eq!(Some(head), result.component("ui/button").unwrap().head);
        assert_eq!(fx.lanes.current_head().unwrap(), Head::Lane(scoped.clone()));

        let history = fx.lanes.get_lane_history(&scoped).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.entries[0].components[0].starts_with("org.remote/ui/button@"));
        assert!(remote.refs().read_ref(&lane_history_ref(&scoped)).unwrap().is_some());
    }

    impl Fixture {
        fn exporter(&self) -> Exporter {
            Exporter::new(self.lanes.clone())
        }
    }
}
