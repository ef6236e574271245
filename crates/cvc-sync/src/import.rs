use std::collections::{BTreeMap, HashMap};

use cvc_graph::Divergence;
use cvc_lanes::LaneManager;
use cvc_model::{Component, Lane};
use cvc_refs::{component_ref, lane_ref, RefUpdate};
use cvc_sources::StagedCommit;
use cvc_store::{ObjectKind, StoredObject};
use cvc_types::{LaneId, ObjectId};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::negotiation::NegotiationEngine;
use crate::transport::RemoteScope;
use crate::types::{ImportRequest, ImportResult, ImportStatus, ImportedComponent, ImportedLane};
use crate::verifier::{fetch_verified, VerificationReport};

/// Brings remote components and lanes into the local scope.
#[derive(Clone)]
pub struct Importer {
    lanes: LaneManager,
}

impl Importer {
    pub fn new(lanes: LaneManager) -> Self {
        Self { lanes }
    }

    /// Import components and lanes from `remote`.
    ///
    /// Every received object is hash-checked before anything is written.
    /// Local refs only fast-forward; a local side that is ahead or has
    /// diverged is left as it is and reported. Lanes arrive without lane
    /// history.
    pub async fn import(
        &self,
        remote: &dyn RemoteScope,
        request: &ImportRequest,
    ) -> SyncResult<ImportResult> {
        if request.ids.is_empty() && request.lanes.is_empty() {
            return Err(SyncError::Validation("nothing to import".into()));
        }
        let scope = remote.name().to_string();
        let advertised: BTreeMap<String, ObjectId> =
            remote.list_refs("refs/").await?.into_iter().collect();

        let mut records = Vec::new();
        for id in &request.ids {
            let record = advertised
                .get(&component_ref(id))
                .copied()
                .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
            records.push(record);
        }
        let mut lanes: Vec<(LaneId, ObjectId)> = Vec::new();
        for lane in &request.lanes {
            let id = match lane.scope() {
                Some(_) => lane.clone(),
                None => lane.with_scope(scope.as_str()),
            };
            let state = advertised
                .get(&lane_ref(&id))
                .copied()
                .ok_or_else(|| SyncError::NotFound(format!("lane {id}")))?;
            lanes.push((id, state));
        }

        let roots: Vec<ObjectId> = records
            .iter()
            .chain(lanes.iter().map(|(_, s)| s))
            .copied()
            .collect();
        let (fetched, report) = self.fetch_closure(remote, roots).await?;
        let objects_fetched = fetched.len();

        // Objects land before any ref can point at them.
        let store = self.lanes.sources().objects();
        let received: Vec<StoredObject> = fetched.values().cloned().collect();
        store.write_batch(&received)?;
        debug!(
            scope = %scope,
            objects = objects_fetched,
            bytes = report.bytes_received,
            "stored fetched objects"
        );

        let mut staged = StagedCommit::new();
        let mut result = ImportResult {
            objects_fetched,
            ..Default::default()
        };
        for record_id in records {
            let imported = self.import_component(&mut staged, &record_id)?;
            result.components.push(imported);
        }
        for (id, state) in lanes {
            let imported = self.import_lane(&mut staged, id, state)?;
            result.lanes.push(imported);
        }
        staged.commit(store, self.lanes.sources().refs())?;

        for diverged in result.diverged() {
            warn!(component = %diverged, "local history diverged from remote; kept local");
        }
        info!(
            scope = %scope,
            components = result.components.len(),
            lanes = result.lanes.len(),
            fetched = objects_fetched,
            "imported"
        );
        Ok(result)
    }

    /// Fetch and store the closure of `roots` without touching any ref.
    /// Returns the number of objects written.
    pub async fn fetch_missing(
        &self,
        remote: &dyn RemoteScope,
        roots: &[ObjectId],
    ) -> SyncResult<usize> {
        let (fetched, _) = self.fetch_closure(remote, roots.to_vec()).await?;
        let received: Vec<StoredObject> = fetched.into_values().collect();
        self.lanes.sources().objects().write_batch(&received)?;
        debug!(scope = remote.name(), objects = received.len(), "fetched missing objects");
        Ok(received.len())
    }

    /// Fetch everything reachable from `roots` that the local store lacks.
    ///
    /// An object already held locally is assumed to have its closure held
    /// too, so the walk stops there.
    async fn fetch_closure(
        &self,
        remote: &dyn RemoteScope,
        roots: Vec<ObjectId>,
    ) -> SyncResult<(HashMap<ObjectId, StoredObject>, VerificationReport)> {
        let local = self.lanes.sources().objects();
        let mut fetched: HashMap<ObjectId, StoredObject> = HashMap::new();
        let mut report = VerificationReport::default();
        let mut frontier = roots;
        while !frontier.is_empty() {
            let wants: Vec<ObjectId> = NegotiationEngine::compute_wants(local, &frontier)?
                .into_iter()
                .filter(|id| !fetched.contains_key(id))
                .collect();
            if wants.is_empty() {
                break;
            }
            let (objects, batch) = fetch_verified(remote, &wants).await?;
            report.objects_verified += batch.objects_verified;
            report.bytes_received += batch.bytes_received;
            frontier = Vec::new();
            for (id, object) in objects {
                frontier.extend(links(&object)?);
                fetched.insert(id, object);
            }
        }
        Ok((fetched, report))
    }

    fn import_component(
        &self,
        staged: &mut StagedCommit,
        record_id: &ObjectId,
    ) -> SyncResult<ImportedComponent> {
        let sources = self.lanes.sources();
        let theirs = Component::from_stored_object(&sources.objects().get(record_id)?)?;
        let name = component_ref(&theirs.id);

        let Some((local_id, ours)) = sources.get_component(&theirs.id)? else {
            staged.update_ref(RefUpdate::create(name, *record_id));
            debug!(component = %theirs.id, "component created from remote");
            return Ok(ImportedComponent {
                id: theirs.id,
                status: ImportStatus::Created,
                head: theirs.head,
            });
        };
        if local_id == *record_id {
            return Ok(ImportedComponent {
                id: theirs.id,
                status: ImportStatus::UpToDate,
                head: theirs.head,
            });
        }

        let divergence = sources
            .graph()
            .compare_heads(ours.head.as_ref(), theirs.head.as_ref())?;
        let status = match divergence {
            Divergence::Same => ImportStatus::UpToDate,
            Divergence::Behind => ImportStatus::FastForward,
            Divergence::Ahead => ImportStatus::LocalAhead,
            Divergence::Diverged => ImportStatus::Diverged,
        };
        if matches!(status, ImportStatus::LocalAhead | ImportStatus::Diverged) {
            return Ok(ImportedComponent {
                id: ours.id,
                status,
                head: ours.head,
            });
        }

        let next = merge_records(&theirs, &ours);
        let next_id = staged.stage(next.to_stored_object()?);
        if next_id != local_id {
            staged.update_ref(RefUpdate::swap(name, Some(local_id), next_id));
        }
        debug!(component = %next.id, ?status, "component imported");
        Ok(ImportedComponent {
            id: next.id,
            status,
            head: next.head,
        })
    }

    fn import_lane(
        &self,
        staged: &mut StagedCommit,
        id: LaneId,
        state: ObjectId,
    ) -> SyncResult<ImportedLane> {
        let name = lane_ref(&id);
        let Some(local) = self.lanes.lane(&id)? else {
            staged.update_ref(RefUpdate::create(name, state));
            return Ok(ImportedLane {
                id,
                status: ImportStatus::Created,
            });
        };
        if local.object_id == state {
            return Ok(ImportedLane {
                id,
                status: ImportStatus::UpToDate,
            });
        }

        let theirs = self.lanes.lane_by_hash(&state)?;
        let status = self.compare_lanes(&local.lane, &theirs)?;
        if status == ImportStatus::FastForward {
            staged.update_ref(RefUpdate::swap(name, Some(local.object_id), state));
        }
        debug!(lane = %id, ?status, "lane imported");
        Ok(ImportedLane { id, status })
    }

    fn compare_lanes(&self, ours: &Lane, theirs: &Lane) -> SyncResult<ImportStatus> {
        let graph = self.lanes.sources().graph();
        let mut ahead = ours.components.keys().any(|k| !theirs.components.contains_key(k));
        let mut behind = false;
        for (key, remote) in &theirs.components {
            let Some(local) = ours.components.get(key) else {
                behind = true;
                continue;
            };
            match graph.compare(&local.head, &remote.head)? {
                Divergence::Same => {}
                Divergence::Ahead => ahead = true,
                Divergence::Behind => behind = true,
                Divergence::Diverged => {
                    ahead = true;
                    behind = true;
                }
            }
        }
        Ok(match (ahead, behind) {
            (false, false) => ImportStatus::UpToDate,
            (false, true) => ImportStatus::FastForward,
            (true, false) => ImportStatus::LocalAhead,
            (true, true) => ImportStatus::Diverged,
        })
    }
}

/// The remote record, keeping local tags it lacks and the higher sequence.
fn merge_records(theirs: &Component, ours: &Component) -> Component {
    let mut next = theirs.clone();
    for (tag, version) in &ours.tags {
        next.tags.entry(tag.clone()).or_insert(*version);
    }
    next.last_sequence = next.last_sequence.max(ours.last_sequence);
    next
}

/// Object ids an object refers to by hash.
fn links(object: &StoredObject) -> SyncResult<Vec<ObjectId>> {
    Ok(match object.kind {
        ObjectKind::Component => {
            let component = Component::from_stored_object(object)?;
            component.head.into_iter().chain(component.tags.into_values()).collect()
        }
        ObjectKind::Version => {
            let version = cvc_model::Version::from_stored_object(object)?;
            version.parents.into_iter().chain(version.files.into_values()).collect()
        }
        ObjectKind::Lane => {
            let lane = Lane::from_stored_object(object)?;
            lane.components.into_values().map(|c| c.head).collect()
        }
        ObjectKind::Source | ObjectKind::LaneHistory => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cvc_model::LogEntry;
    use cvc_store::StoreError;

    use crate::export::Exporter;
    use crate::memory::InMemoryRemote;
    use crate::tests::{comp, fixture, snap_main, Fixture};
    use crate::types::{ExportRequest, RefRejection};

    /// Serves versions with altered bytes.
    struct TamperingRemote(InMemoryRemote);

    #[async_trait]
    impl RemoteScope for TamperingRemote {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn list_refs(&self, prefix: &str) -> SyncResult<Vec<(String, ObjectId)>> {
            self.0.list_refs(prefix).await
        }

        async fn missing_objects(&self, ids: &[ObjectId]) -> SyncResult<Vec<ObjectId>> {
            self.0.missing_objects(ids).await
        }

        async fn fetch_objects(
            &self,
            ids: &[ObjectId],
        ) -> SyncResult<Vec<(ObjectId, StoredObject)>> {
            let objects = self.0.fetch_objects(ids).await?;
            Ok(objects
                .into_iter()
                .map(|(id, obj)| match obj.kind {
                    ObjectKind::Version => {
                        let mut data = obj.data.clone();
                        data.extend_from_slice(b" ");
                        (id, StoredObject::new(obj.kind, data))
                    }
                    _ => (id, obj),
                })
                .collect())
        }

        async fn push_objects(&self, objects: &[StoredObject]) -> SyncResult<Vec<ObjectId>> {
            self.0.push_objects(objects).await
        }

        async fn update_refs(&self, updates: &[RefUpdate]) -> SyncResult<Vec<RefRejection>> {
            self.0.update_refs(updates).await
        }
    }

    async fn published(fx: &Fixture, remote: &InMemoryRemote, name: &str) {
        Exporter::new(fx.lanes.clone())
            .export(remote, &ExportRequest::components([comp(name)]))
            .await
            .unwrap();
    }

    fn importer(fx: &Fixture) -> Importer {
        Importer::new(fx.lanes.clone())
    }

    fn request(name: &str) -> ImportRequest {
        ImportRequest::components([comp(name)])
    }

    // ---------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn import_creates_component_with_full_history() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        snap_main(&origin, "ui/button", "two", &[]);
        let remote = InMemoryRemote::new("org.remote");
        published(&origin, &remote, "ui/button").await;

        let local = fixture(false);
        let result = importer(&local).import(&remote, &request("ui/button")).await.unwrap();

        let imported = result.component("ui/button").unwrap();
        assert_eq!(imported.status, ImportStatus::Created);
        assert_eq!(imported.id.scope(), Some("org.remote"));
        let (_, component) = local.sources().load_component(&comp("ui/button")).unwrap();
        assert_eq!(component.head, imported.head);

        let history = local.sources().graph().history(component.head).unwrap();
        assert_eq!(history.len(), 2);
        let files = local.sources().read_files(&history[0].1).unwrap();
        assert_eq!(files["index.ts"], b"two".to_vec());
    }

    #[tokio::test]
    async fn fetch_missing_writes_objects_but_no_refs() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        published(&origin, &remote, "ui/button").await;
        let (_, exported) = origin.sources().load_component(&comp("ui/button")).unwrap();
        let head = exported.head.unwrap();

        let local = fixture(false);
        let written = importer(&local).fetch_missing(&remote, &[head]).await.unwrap();
        assert_eq!(written, 2);
        let version = local.sources().load_version(&head).unwrap();
        assert_eq!(local.sources().read_files(&version).unwrap()["index.ts"], b"one".to_vec());
        assert!(local.sources().get_component(&comp("ui/button")).unwrap().is_none());

        let again = importer(&local).fetch_missing(&remote, &[head]).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn second_import_fast_forwards() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        published(&origin, &remote, "ui/button").await;
        let local = fixture(false);
        importer(&local).import(&remote, &request("ui/button")).await.unwrap();

        snap_main(&origin, "ui/button", "two", &[]);
        published(&origin, &remote, "ui/button").await;
        let result = importer(&local).import(&remote, &request("ui/button")).await.unwrap();

        let imported = result.component("ui/button").unwrap();
        assert_eq!(imported.status, ImportStatus::FastForward);
        assert_eq!(result.objects_fetched, 3);
        let (_, component) = local.sources().load_component(&comp("ui/button")).unwrap();
        assert_eq!(component.head, imported.head);
    }

    #[tokio::test]
    async fn import_when_up_to_date_fetches_nothing() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        published(&origin, &remote, "ui/button").await;
        let local = fixture(false);
        importer(&local).import(&remote, &request("ui/button")).await.unwrap();

        let result = importer(&local).import(&remote, &request("ui/button")).await.unwrap();
        assert_eq!(result.objects_fetched, 0);
        assert_eq!(result.component("ui/button").unwrap().status, ImportStatus::UpToDate);
    }

    #[tokio::test]
    async fn local_work_on_top_is_kept() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        published(&origin, &remote, "ui/button").await;
        let local = fixture(false);
        importer(&local).import(&remote, &request("ui/button")).await.unwrap();
        let mine = snap_main(&local, "ui/button", "mine", &[]);

        let result = importer(&local).import(&remote, &request("ui/button")).await.unwrap();
        assert_eq!(result.component("ui/button").unwrap().status, ImportStatus::LocalAhead);
        let (_, component) = local.sources().load_component(&comp("ui/button")).unwrap();
        assert_eq!(component.head, Some(mine));
    }

    #[tokio::test]
    async fn diverged_history_is_reported_and_left_alone() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        let remote = InMemoryRemote::new("org.remote");
        published(&origin, &remote, "ui/button").await;
        let local = fixture(false);
        importer(&local).import(&remote, &request("ui/button")).await.unwrap();

        snap_main(&origin, "ui/button", "theirs", &[]);
        published(&origin, &remote, "ui/button").await;
        let mine = snap_main(&local, "ui/button", "mine", &[]);

        let result = importer(&local).import(&remote, &request("ui/button")).await.unwrap();
        assert_eq!(result.diverged(), vec![&comp("ui/button").with_scope("org.remote")]);
        let (_, component) = local.sources().load_component(&comp("ui/button")).unwrap();
        assert_eq!(component.head, Some(mine));
    }

    #[tokio::test]
    async fn unknown_component_is_not_found() {
        let remote = InMemoryRemote::new("org.remote");
        let local = fixture(false);
        let err = importer(&local).import(&remote, &request("ui/missing")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    // ---------------------------------------------------------------
    // Integrity
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn tampered_object_fails_and_writes_nothing() {
        let origin = fixture(false);
        snap_main(&origin, "ui/button", "one", &[]);
        let remote = TamperingRemote(InMemoryRemote::new("org.remote"));
        published(&origin, &remote.0, "ui/button").await;

        let local = fixture(false);
        let err = importer(&local).import(&remote, &request("ui/button")).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::CorruptObject { .. })));
        assert!(local.sources().get_component(&comp("ui/button")).unwrap().is_none());
        assert!(local.sources().refs().component_refs().unwrap().is_empty());
    }

    // ---------------------------------------------------------------
    // Lanes
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn lane_import_adds_no_history() {
        let origin = fixture(true);
        snap_main(&origin, "ui/button", "one", &[]);
        origin.lanes.create_lane("stage", LogEntry::new("", "alice")).unwrap();
        let remote = InMemoryRemote::new("org.remote");
        let stage = LaneId::new("stage").unwrap();
        Exporter::new(origin.lanes.clone())
            .export(&remote, &ExportRequest::default().with_lane(stage.clone()))
            .await
            .unwrap();

        let local = fixture(true);
        let result = importer(&local)
            .import(&remote, &ImportRequest::default().with_lane(stage.clone()))
            .await
            .unwrap();

        let scoped = stage.with_scope("org.remote");
        assert_eq!(
            result.lanes,
            vec![ImportedLane {
                id: scoped.clone(),
                status: ImportStatus::Created
            }]
        );
        let state = local.lanes.load_lane(&scoped).unwrap();
        assert_eq!(state.lane.components.len(), 1);
        assert!(local.lanes.get_lane_history(&scoped).unwrap().is_empty());

        let head = state.lane.components.values().next().unwrap().head;
        assert!(local.sources().objects().exists(&head).unwrap());
    }
}
