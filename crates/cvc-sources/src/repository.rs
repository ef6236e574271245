use std::collections::BTreeMap;
use std::sync::Arc;

use cvc_graph::VersionGraph;
use cvc_model::{Component, LogEntry, Source, Version};
use cvc_refs::{component_ref, names, RefStore, RefUpdate};
use cvc_store::ObjectStore;
use cvc_types::{ComponentId, ObjectId};
use tracing::{debug, info};

use crate::error::{SourceError, SourceResult};
use crate::staged::StagedCommit;

/// File path to raw content.
pub type FileMap = BTreeMap<String, Vec<u8>>;

/// What a caller supplies to record a new version of a component.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub id: ComponentId,
    pub files: FileMap,
    pub log: LogEntry,
}

/// What [`SourceRepository::add_source`] persisted.
#[derive(Debug, Clone)]
pub struct AddSourceResult {
    pub component: Component,
    pub version_id: ObjectId,
    pub version: Version,
    pub created: bool,
}

/// Component records and versions over an object store and a ref table.
#[derive(Clone)]
pub struct SourceRepository {
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
}

impl SourceRepository {
    pub fn new(objects: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>) -> Self {
        Self { objects, refs }
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    pub fn graph(&self) -> VersionGraph<'_> {
        VersionGraph::new(self.objects.as_ref())
    }

    // ---------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------

    /// The current record of a component and the object id it is stored
    /// under, or `None` if the component was never added.
    pub fn get_component(&self, id: &ComponentId) -> SourceResult<Option<(ObjectId, Component)>> {
        let Some(record_id) = self.refs.read_ref(&component_ref(id))? else {
            return Ok(None);
        };
        let obj = self.objects.get(&record_id)?;
        Ok(Some((record_id, Component::from_stored_object(&obj)?)))
    }

    /// Like [`get_component`](Self::get_component) but absence is an error.
    pub fn load_component(&self, id: &ComponentId) -> SourceResult<(ObjectId, Component)> {
        self.get_component(id)?
            .ok_or_else(|| SourceError::ComponentNotFound(id.clone()))
    }

    /// Look up a component by identity, creating an empty record if absent.
    ///
    /// Creation is a compare-and-swap from "no ref", so racing callers end
    /// up sharing whichever record landed first.
    pub fn find_or_add_component(&self, id: &ComponentId) -> SourceResult<(ObjectId, Component)> {
        if let Some(found) = self.get_component(id)? {
            return Ok(found);
        }
        let component = Component::new(id.clone());
        let mut staged = StagedCommit::new();
        let record_id = staged.stage(component.to_stored_object()?);
        staged.update_ref(RefUpdate::create(component_ref(id), record_id));
        match staged.commit(self.objects.as_ref(), self.refs.as_ref()) {
            Ok(_) => {
                info!(component = %id, "component added");
                Ok((record_id, component))
            }
            Err(e) if e.is_concurrent_modification() => self.load_component(id),
            Err(e) => Err(e),
        }
    }

    /// Every component with a ref, sorted by identity key.
    pub fn list_components(&self) -> SourceResult<Vec<Component>> {
        self.refs
            .component_refs()?
            .into_iter()
            .filter(|(name, _)| names::component_key(name).is_some())
            .map(|(_, record_id)| {
                let obj = self.objects.get(&record_id)?;
                Ok(Component::from_stored_object(&obj)?)
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Versions and sources
    // ---------------------------------------------------------------

    /// Turn file contents into sources and a candidate version.
    ///
    /// Nothing is persisted. Dependencies, policy and tag are left empty
    /// for the caller to fill in.
    pub fn build_version(
        &self,
        id: &ComponentId,
        files: &FileMap,
        parents: Vec<ObjectId>,
        sequence: u64,
        log: LogEntry,
    ) -> (Version, Vec<Source>) {
        let sources: Vec<Source> = files.values().map(|c| Source::new(c.clone())).collect();
        let file_ids = files
            .keys()
            .zip(&sources)
            .map(|(path, src)| (path.clone(), src.id()))
            .collect();
        let version = Version {
            component: id.clone(),
            sequence,
            tag: None,
            parents,
            files: file_ids,
            dependencies: Vec::new(),
            policy: Default::default(),
            log,
            build_status: Default::default(),
            extensions: BTreeMap::new(),
        };
        (version, sources)
    }

    /// Sequence for a new version: above both the component counter and
    /// every parent, so it keeps increasing along any line of history.
    pub fn next_sequence(&self, component: &Component, parents: &[ObjectId]) -> SourceResult<u64> {
        let graph = self.graph();
        let mut floor = component.last_sequence;
        for parent in parents {
            floor = floor.max(graph.load_version(parent)?.sequence);
        }
        Ok(floor + 1)
    }

    /// Record a new main-line version of a component.
    ///
    /// Finds or adds the component, builds the version on top of its head,
    /// writes sources and version, and swaps the component ref last,
    /// conditioned on the record observed at the start.
    pub fn add_source(&self, input: SourceInput) -> SourceResult<AddSourceResult> {
        let existed = self.get_component(&input.id)?.is_some();
        let (record_id, component) = self.find_or_add_component(&input.id)?;
        let parents: Vec<ObjectId> = component.head.into_iter().collect();
        let sequence = self.next_sequence(&component, &parents)?;
        let (version, sources) =
            self.build_version(&component.id, &input.files, parents, sequence, input.log);

        let mut staged = StagedCommit::new();
        for source in &sources {
            staged.stage(source.to_stored_object());
        }
        let version_id = staged.stage(version.to_stored_object()?);
        let next = component.advance(version_id, sequence, None);
        let next_record = staged.stage(next.to_stored_object()?);
        staged.update_ref(RefUpdate::swap(
            component_ref(&component.id),
            Some(record_id),
            next_record,
        ));
        staged.commit(self.objects.as_ref(), self.refs.as_ref())?;

        debug!(
            component = %component.id,
            version = %version_id.short_hex(),
            sequence,
            "source added"
        );
        Ok(AddSourceResult {
            component: next,
            version_id,
            version,
            created: !existed,
        })
    }

    pub fn load_version(&self, id: &ObjectId) -> SourceResult<Version> {
        Ok(self.graph().load_version(id)?)
    }

    pub fn load_source(&self, id: &ObjectId) -> SourceResult<Source> {
        let obj = self.objects.get(id)?;
        Ok(Source::from_stored_object(&obj)?)
    }

    /// Read back the file contents of a version.
    pub fn read_files(&self, version: &Version) -> SourceResult<FileMap> {
        version
            .files
            .iter()
            .map(|(path, id)| Ok((path.clone(), self.load_source(id)?.into_content())))
            .collect()
    }

    /// Resolve a version label (semver tag or version hash) of a component.
    pub fn resolve_version(&self, id: &ComponentId, label: &str) -> SourceResult<ObjectId> {
        let (_, component) = self.load_component(id)?;
        component
            .resolve_label(label)
            .ok_or_else(|| SourceError::VersionNotFound {
                component: id.clone(),
                label: label.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvc_refs::InMemoryRefStore;
    use cvc_store::InMemoryObjectStore;

    fn repo() -> SourceRepository {
        SourceRepository::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
        )
    }

    fn input(id: &str, files: &[(&str, &str)]) -> SourceInput {
        SourceInput {
            id: ComponentId::parse(id).unwrap(),
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
                .collect(),
            log: LogEntry::new("snap", "dev"),
        }
    }

    // ---------------------------------------------------------------
    // find_or_add_component
    // ---------------------------------------------------------------

    #[test]
    fn find_or_add_is_idempotent() {
        let repo = repo();
        let id = ComponentId::parse("ui/button").unwrap();
        let (a, _) = repo.find_or_add_component(&id).unwrap();
        let (b, _) = repo.find_or_add_component(&id).unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.list_components().unwrap().len(), 1);
    }

    #[test]
    fn scoped_and_unscoped_ids_share_a_record() {
        let repo = repo();
        let id = ComponentId::parse("ui/button").unwrap();
        let (a, _) = repo.find_or_add_component(&id).unwrap();
        let (b, _) = repo.find_or_add_component(&id.with_scope("org")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn racing_creators_converge() {
        let repo = repo();
        let id = ComponentId::parse("ui/button").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                let id = id.clone();
                std::thread::spawn(move || repo.find_or_add_component(&id).unwrap().0)
            })
            .collect();
        let ids: std::collections::HashSet<ObjectId> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
    }

    // ---------------------------------------------------------------
    // add_source
    // ---------------------------------------------------------------

    #[test]
    fn add_source_advances_head() {
        let repo = repo();
        let first = repo.add_source(input("ui/button", &[("index.ts", "v1")])).unwrap();
        assert!(first.created);
        assert!(first.version.is_root());
        assert_eq!(first.version.sequence, 1);

        let second = repo.add_source(input("ui/button", &[("index.ts", "v2")])).unwrap();
        assert!(!second.created);
        assert_eq!(second.version.parents, vec![first.version_id]);
        assert_eq!(second.version.sequence, 2);

        let (_, stored) = repo.load_component(&ComponentId::parse("ui/button").unwrap()).unwrap();
        assert_eq!(stored.head, Some(second.version_id));
        assert_eq!(stored.last_sequence, 2);
    }

    #[test]
    fn identical_files_share_sources() {
        let repo = repo();
        let a = repo.add_source(input("a", &[("index.ts", "same")])).unwrap();
        let b = repo.add_source(input("b", &[("index.ts", "same")])).unwrap();
        assert_eq!(a.version.files["index.ts"], b.version.files["index.ts"]);
    }

    #[test]
    fn read_files_roundtrip() {
        let repo = repo();
        let added = repo
            .add_source(input("ui/button", &[("index.ts", "export {}"), ("button.tsx", "<b/>")]))
            .unwrap();
        let files = repo.read_files(&added.version).unwrap();
        assert_eq!(files["button.tsx"], b"<b/>");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn build_version_persists_nothing() {
        let repo = repo();
        let id = ComponentId::parse("ui/button").unwrap();
        let files: FileMap = [("index.ts".to_string(), b"x".to_vec())].into();
        let (version, sources) =
            repo.build_version(&id, &files, vec![], 1, LogEntry::new("m", "a"));
        assert_eq!(sources.len(), 1);
        assert!(!repo.objects().exists(&version.files["index.ts"]).unwrap());
    }

    #[test]
    fn missing_version_label() {
        let repo = repo();
        repo.add_source(input("ui/button", &[("index.ts", "v1")])).unwrap();
        let err = repo
            .resolve_version(&ComponentId::parse("ui/button").unwrap(), "1.0.0")
            .unwrap_err();
        assert!(matches!(err, SourceError::VersionNotFound { .. }));
    }
}
