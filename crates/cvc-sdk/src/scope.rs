//! The [`Scope`] facade.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cvc_lanes::{LaneDiff, LaneManager, LaneState, MergeReport, MergeStrategy};
use cvc_model::{LaneHistory, LogEntry};
use cvc_refs::{FsRefStore, Head, InMemoryRefStore, RefStore};
use cvc_snap::{
    BuildPipeline, ComponentState, ComponentStatus, DependencyResolver, SnapParams, StaticResolver,
    TagEngine, TagParams, TagResults, Workspace,
};
use cvc_sources::{FileMap, SourceError, SourceRepository};
use cvc_store::fsutil::atomic_write;
use cvc_store::{FsObjectStore, InMemoryObjectStore, ObjectStore};
use cvc_sync::{
    ExportRequest, ExportResult, Exporter, ImportRequest, ImportResult, Importer, RemoteScope,
};
use cvc_types::{ComponentId, LaneId, ObjectId};
use tracing::{debug, info, warn};

use crate::config::ScopeConfig;
use crate::error::{ErrorKind, SdkError, SdkResult};
use crate::summary::{
    CheckoutFailure, ComponentListing, HistoryMaterialization, ShownVersion, VersionSummary,
};

const WORKSPACE_FILE: &str = "workspace.json";

/// One collection of components and the working area editing them.
///
/// Every mutating call persists the working area when the scope has a
/// path. Objects and refs are persisted by their stores as they change.
pub struct Scope {
    config: ScopeConfig,
    lanes: LaneManager,
    resolver: Arc<dyn DependencyResolver>,
    pipeline: Option<Arc<dyn BuildPipeline>>,
    engine: TagEngine,
    workspace: Workspace,
    remote: Option<Arc<dyn RemoteScope>>,
}

impl Scope {
    /// A scope held entirely in memory. `config.path` is ignored.
    pub fn in_memory(config: ScopeConfig) -> SdkResult<Self> {
        info!(scope = %config.name, "opening in-memory scope");
        Ok(Self::assemble(
            config,
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
            Workspace::new(),
        ))
    }

    /// Open (or initialize) the scope persisted at `config.path`.
    pub fn open(config: ScopeConfig) -> SdkResult<Self> {
        let root = config.path.clone().ok_or_else(|| SdkError::Config {
            path: None,
            message: "a persisted scope needs a path".to_string(),
        })?;
        fs::create_dir_all(&root)?;
        let objects = FsObjectStore::open(&root)?;
        let refs = FsRefStore::open(&root)?;
        let workspace = load_workspace(&root.join(WORKSPACE_FILE))?;
        info!(
            scope = %config.name,
            path = %root.display(),
            tracked = workspace.len(),
            "opened scope"
        );
        Ok(Self::assemble(config, Arc::new(objects), Arc::new(refs), workspace))
    }

    fn assemble(
        config: ScopeConfig,
        objects: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        workspace: Workspace,
    ) -> Self {
        let sources = SourceRepository::new(objects, refs);
        let lanes = LaneManager::new(sources, config.lane_config());
        let resolver: Arc<dyn DependencyResolver> = Arc::new(StaticResolver::new());
        let engine = TagEngine::new(lanes.clone(), resolver.clone(), config.snap_config());
        Self {
            config,
            lanes,
            resolver,
            pipeline: None,
            engine,
            workspace,
            remote: None,
        }
    }

    /// Use `resolver` to find the dependencies of tagged components.
    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = resolver;
        self.rebuild_engine();
        self
    }

    /// Run `pipeline` when a tag or snap asks for a build.
    pub fn with_pipeline(mut self, pipeline: Arc<dyn BuildPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self.rebuild_engine();
        self
    }

    /// Fetch objects missing locally from `remote` when checking out lane
    /// history.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteScope>) -> Self {
        self.remote = Some(remote);
        self
    }

    fn rebuild_engine(&mut self) {
        let engine = TagEngine::new(
            self.lanes.clone(),
            self.resolver.clone(),
            self.config.snap_config(),
        );
        self.engine = match &self.pipeline {
            Some(pipeline) => engine.with_pipeline(pipeline.clone()),
            None => engine,
        };
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn lanes(&self) -> &LaneManager {
        &self.lanes
    }

    pub fn sources(&self) -> &SourceRepository {
        self.lanes.sources()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    // ---------------------------------------------------------------
    // Working area
    // ---------------------------------------------------------------

    /// Track `id` with `files`, replacing its files if already tracked.
    pub fn add(&mut self, id: ComponentId, files: FileMap) -> SdkResult<()> {
        debug!(component = %id, files = files.len(), "tracking component");
        self.workspace.track(id, files);
        self.save_workspace()
    }

    /// Write one file of a tracked component.
    pub fn write_file(
        &mut self,
        id: &ComponentId,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> SdkResult<()> {
        if !self.workspace.write_file(id, path, content) {
            return Err(SdkError::NotTracked(id.clone()));
        }
        self.save_workspace()
    }

    /// Stop tracking `id`. Its stored versions are untouched.
    pub fn untrack(&mut self, id: &ComponentId) -> SdkResult<()> {
        if self.workspace.untrack(id).is_none() {
            return Err(SdkError::NotTracked(id.clone()));
        }
        self.save_workspace()
    }

    /// Where each tracked component stands against the active history.
    pub fn status(&self) -> SdkResult<Vec<ComponentStatus>> {
        Ok(self.engine.status(&self.workspace)?)
    }

    // ---------------------------------------------------------------
    // Tag and snap
    // ---------------------------------------------------------------

    pub async fn tag(&mut self, params: &TagParams) -> SdkResult<TagResults> {
        let results = self.engine.tag(&mut self.workspace, params).await?;
        info!(
            tagged = results.tagged.len(),
            auto_tagged = results.auto_tagged.len(),
            soft = results.is_soft_tag,
            "tag finished"
        );
        self.save_workspace()?;
        Ok(results)
    }

    pub async fn snap(&mut self, params: &SnapParams) -> SdkResult<TagResults> {
        let results = self.engine.snap(&mut self.workspace, params).await?;
        info!(
            snapped = results.tagged.len(),
            auto_snapped = results.auto_tagged.len(),
            "snap finished"
        );
        self.save_workspace()?;
        Ok(results)
    }

    // ---------------------------------------------------------------
    // Lanes
    // ---------------------------------------------------------------

    /// Create a lane forked from the active history and switch to it.
    pub fn create_lane(&mut self, name: &str, message: Option<&str>) -> SdkResult<LaneState> {
        let state = self.lanes.create_lane(name, self.log_entry(message))?;
        self.save_workspace()?;
        Ok(state)
    }

    pub fn current_head(&self) -> SdkResult<Head> {
        Ok(self.lanes.current_head()?)
    }

    pub fn list_lanes(&self) -> SdkResult<Vec<LaneState>> {
        Ok(self.lanes.get_lanes()?)
    }

    /// Switch the active history to `target` (`main` or a lane name).
    ///
    /// Tracked components, and every component on the target lane, get the
    /// files of their head in the new history. Unsaved working changes to
    /// those components are replaced.
    pub fn switch_lanes(&mut self, target: &str) -> SdkResult<Head> {
        let head = self.lanes.switch_lanes(target)?;
        let written = self.materialize_head(&head)?;
        info!(head = %head.name(), components = written, "switched");
        self.save_workspace()?;
        Ok(head)
    }

    pub fn remove_lanes(&mut self, names: &[&str], force: bool) -> SdkResult<Vec<LaneId>> {
        Ok(self.lanes.remove_lanes(names, force)?)
    }

    /// Recreate a removed lane from the id of one of its states.
    pub fn restore_lane(&mut self, state: &ObjectId) -> SdkResult<LaneState> {
        Ok(self.lanes.restore_lane(state)?)
    }

    pub fn diff_status(&self, lane: &str, baseline: Option<&str>) -> SdkResult<LaneDiff> {
        Ok(self.lanes.diff_status(lane, baseline)?)
    }

    pub fn merge_status(&self, from: &str, into: Option<&str>) -> SdkResult<MergeReport> {
        Ok(self.lanes.merge_status(from, into)?)
    }

    /// Merge `from` into the active history and refresh the merged
    /// components in the working area.
    pub fn merge_lane(
        &mut self,
        from: &str,
        strategy: Option<MergeStrategy>,
        message: Option<&str>,
    ) -> SdkResult<MergeReport> {
        let report = self.lanes.merge_lane(from, strategy, self.log_entry(message))?;
        let heads: Vec<ObjectId> = report.changed().filter_map(|c| c.result).collect();
        for head in &heads {
            self.materialize(head)?;
        }
        info!(from, into = %report.into, changed = heads.len(), "merged");
        self.save_workspace()?;
        Ok(report)
    }

    pub fn lane_history(&self, lane: &str) -> SdkResult<LaneHistory> {
        Ok(self.lanes.get_lane_history(&LaneId::parse(lane)?)?)
    }

    /// Write the component set recorded by a lane history entry into the
    /// working area. Lane refs and history are not touched.
    ///
    /// A component whose objects are missing locally is fetched from the
    /// remote given to [`Scope::with_remote`], if any; otherwise it is
    /// reported in `failed_components`. Any other error, such as a
    /// corrupt object, is returned.
    pub async fn checkout_history(
        &mut self,
        lane: &str,
        entry_id: &str,
    ) -> SdkResult<HistoryMaterialization> {
        let checkout = self.lanes.checkout_history(&LaneId::parse(lane)?, entry_id)?;
        let mut components = Vec::new();
        let mut failed_components = Vec::new();
        for entry in checkout.lane.components.values() {
            let outcome = match self.materialize(&entry.head) {
                Err(e) if e.kind() == ErrorKind::NotFound && self.remote.is_some() => {
                    self.refetch(&entry.head).await
                }
                other => other,
            };
            match outcome {
                Ok(()) => components.push(entry.id.clone()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(component = %entry.id, error = %e, "history checkout skipped component");
                    failed_components.push(CheckoutFailure {
                        id: entry.id.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        self.save_workspace()?;
        Ok(HistoryMaterialization {
            entry: checkout.entry,
            components,
            failed_components,
        })
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Every component with a record, optionally limited to a namespace
    /// and its sub-namespaces.
    pub fn list_components(&self, namespace: Option<&str>) -> SdkResult<Vec<ComponentListing>> {
        let components = self.sources().list_components()?;
        components
            .into_iter()
            .filter(|c| namespace.map_or(true, |ns| in_namespace(&c.id, ns)))
            .map(|c| -> SdkResult<ComponentListing> {
                let head = self.lanes.main_head(&c.id)?;
                Ok(ComponentListing {
                    latest_tag: c.latest_tag().map(|(tag, _)| tag.clone()),
                    id: c.id,
                    head,
                })
            })
            .collect()
    }

    /// Versions of `id` reachable from its head in the active history,
    /// newest first.
    pub fn log(&self, id: &ComponentId) -> SdkResult<Vec<VersionSummary>> {
        let head = self.head_of(id)?;
        let history = self.sources().graph().history(Some(head))?;
        Ok(history
            .iter()
            .map(|(version_id, version)| VersionSummary::new(*version_id, version))
            .collect())
    }

    /// One version of `id`: the one labelled `label`, or its head in the
    /// active history.
    pub fn show(&self, id: &ComponentId, label: Option<&str>) -> SdkResult<ShownVersion> {
        let version_id = match label {
            Some(label) => self.sources().resolve_version(id, label)?,
            None => self.head_of(id)?,
        };
        let version = self.sources().load_version(&version_id)?;
        let files = self.sources().read_files(&version)?;
        let dependencies = self.engine.resolved_dependencies(&version)?;
        Ok(ShownVersion {
            id: version_id,
            label: version.label(&version_id),
            version,
            files,
            dependencies,
        })
    }

    // ---------------------------------------------------------------
    // Remotes
    // ---------------------------------------------------------------

    /// Export components and lanes to `remote`. Exported components are
    /// renamed to their scoped ids in the working area.
    pub async fn export(
        &mut self,
        remote: &dyn RemoteScope,
        request: &ExportRequest,
    ) -> SdkResult<ExportResult> {
        let result = Exporter::new(self.lanes.clone()).export(remote, request).await?;
        for component in &result.components {
            self.workspace.rename(&component.id);
        }
        self.save_workspace()?;
        Ok(result)
    }

    /// Import components and lanes from `remote`.
    ///
    /// Components whose refs moved get their new head's files in the
    /// working area, unless they carry unsaved changes.
    pub async fn import(
        &mut self,
        remote: &dyn RemoteScope,
        request: &ImportRequest,
    ) -> SdkResult<ImportResult> {
        let dirty: BTreeSet<String> = self
            .status()?
            .into_iter()
            .filter(|s| s.state != ComponentState::Untracked)
            .map(|s| s.id.key())
            .collect();
        let result = Importer::new(self.lanes.clone()).import(remote, request).await?;
        let head = self.lanes.current_head()?;
        for imported in result.components.iter().filter(|c| c.status.updated()) {
            if dirty.contains(&imported.id.key()) {
                warn!(component = %imported.id, "working changes kept; imported head not written");
                continue;
            }
            if let Some(version) = self.lanes.effective_head(&head, &imported.id)? {
                self.materialize(&version)?;
            }
        }
        self.save_workspace()?;
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn log_entry(&self, message: Option<&str>) -> LogEntry {
        LogEntry::new(message.unwrap_or_default(), self.config.author.as_str())
    }

    fn head_of(&self, id: &ComponentId) -> SdkResult<ObjectId> {
        let head = self.lanes.current_head()?;
        self.lanes
            .effective_head(&head, id)?
            .ok_or_else(|| SourceError::ComponentNotFound(id.clone()).into())
    }

    /// Put `version`'s files into the working area under its component id.
    fn materialize(&mut self, version_id: &ObjectId) -> SdkResult<()> {
        let version = self.sources().load_version(version_id)?;
        let files = self.sources().read_files(&version)?;
        self.workspace.track(version.component.clone(), files);
        self.workspace.rename(&version.component);
        Ok(())
    }

    /// Fetch what `version_id` needs from the configured remote, then
    /// materialize it.
    async fn refetch(&mut self, version_id: &ObjectId) -> SdkResult<()> {
        if let Some(remote) = self.remote.clone() {
            let roots: Vec<ObjectId> = match self.sources().load_version(version_id) {
                Ok(version) => version.files.into_values().collect(),
                Err(_) => vec![*version_id],
            };
            let fetched = Importer::new(self.lanes.clone())
                .fetch_missing(remote.as_ref(), &roots)
                .await?;
            debug!(version = %version_id.short_hex(), fetched, "refetched from remote");
        }
        self.materialize(version_id)
    }

    fn materialize_head(&mut self, head: &Head) -> SdkResult<usize> {
        let mut ids: Vec<ComponentId> = self.workspace.components().map(|c| c.id.clone()).collect();
        if let Head::Lane(lane) = head {
            ids.extend(self.lanes.load_lane(lane)?.lane.component_ids().cloned());
        }
        let mut seen = BTreeSet::new();
        ids.retain(|id| seen.insert(id.key()));

        let mut written = 0;
        for id in &ids {
            if let Some(version) = self.lanes.effective_head(head, id)? {
                self.materialize(&version)?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn workspace_path(&self) -> Option<PathBuf> {
        self.config.path.as_ref().map(|root| root.join(WORKSPACE_FILE))
    }

    fn save_workspace(&self) -> SdkResult<()> {
        let Some(path) = self.workspace_path() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.workspace)
            .map_err(|e| SdkError::Workspace(e.to_string()))?;
        atomic_write(&path, &bytes)?;
        debug!(path = %path.display(), tracked = self.workspace.len(), "working area saved");
        Ok(())
    }
}

fn load_workspace(path: &Path) -> SdkResult<Workspace> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| SdkError::Workspace(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Workspace::new()),
        Err(e) => Err(e.into()),
    }
}

fn in_namespace(id: &ComponentId, namespace: &str) -> bool {
    let ns = namespace.trim_end_matches('/');
    id.namespace() == ns || id.namespace().starts_with(&format!("{ns}/"))
}
