//! The tag/snap engine.
//!
//! A run observes the target history (main, or the active lane), selects
//! components, computes their next versions, pulls in dependents, resolves
//! dependencies, optionally builds, and then persists everything through one
//! staged commit whose ref swaps are conditioned on what was observed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cvc_lanes::{LaneManager, LaneState};
use cvc_model::{
    BuildStatus, Component, ComponentDependency, DependencyPolicy, LogEntry, ReleaseType, SemVer,
    Source, Version,
};
use cvc_refs::{component_ref, RefUpdate};
use cvc_sources::{FileMap, SourceRepository, StagedCommit};
use cvc_types::{ComponentId, ObjectId};
use tracing::{debug, info, warn};

use crate::config::SnapConfig;
use crate::error::{SnapError, SnapResult};
use crate::params::{validate_options, BatchOptions, ReleaseBump, SnapParams, TagParams};
use crate::pipeline::{BuildOptions, BuildPipeline, DependencyResolver};
use crate::results::{
    AutoTagged, ComponentState, ComponentStatus, FailedComponent, TagResults, TaggedComponent,
};
use crate::workspace::{SoftTag, Workspace};

const AUTO_TAG_MESSAGE: &str = "bump dependencies versions";

/// Versioning applied by one run.
enum Mode {
    Snap,
    Tag {
        bump: ReleaseBump,
        explicit: Option<SemVer>,
        increment_by: u32,
        ignore_newest: bool,
        soft: bool,
    },
    Persist,
}

impl Mode {
    fn is_snap(&self) -> bool {
        matches!(self, Self::Snap)
    }
}

/// The history a run extends, as observed when it started.
enum Target {
    Main,
    Lane(LaneState),
}

/// A component in the batch.
struct Candidate {
    id: ComponentId,
    /// Component record object id when the run started; `None` if new.
    record: Option<ObjectId>,
    component: Component,
    parents: Vec<ObjectId>,
    previous: Option<Version>,
    files: FileMap,
    tag: Option<SemVer>,
    message: String,
    policy: DependencyPolicy,
    /// Non-empty for dependents pulled in by auto-tagging.
    triggered_by: Vec<ComponentId>,
}

impl Candidate {
    fn is_auto(&self) -> bool {
        !self.triggered_by.is_empty()
    }
}

/// Extends component histories with tags and snaps.
pub struct TagEngine {
    lanes: LaneManager,
    resolver: Arc<dyn DependencyResolver>,
    pipeline: Option<Arc<dyn BuildPipeline>>,
    config: SnapConfig,
}

impl TagEngine {
    pub fn new(
        lanes: LaneManager,
        resolver: Arc<dyn DependencyResolver>,
        config: SnapConfig,
    ) -> Self {
        Self {
            lanes,
            resolver,
            pipeline: None,
            config,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn BuildPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn lanes(&self) -> &LaneManager {
        &self.lanes
    }

    fn sources(&self) -> &SourceRepository {
        self.lanes.sources()
    }

    // ---------------------------------------------------------------
    // Public operations
    // ---------------------------------------------------------------

    /// State of every tracked component relative to its current head.
    pub fn status(&self, ws: &Workspace) -> SnapResult<Vec<ComponentStatus>> {
        let target = self.observe_target()?;
        ws.components()
            .map(|wc| {
                let head = self.head_in(&target, &wc.id)?;
                let modified = match &head {
                    Some(h) => wc.differs_from(&self.sources().load_version(h)?),
                    None => true,
                };
                let state = if wc.soft_tag.is_some() {
                    ComponentState::SoftTagged
                } else if modified {
                    ComponentState::ModifiedPending
                } else {
                    ComponentState::Untracked
                };
                Ok(ComponentStatus {
                    id: wc.id.clone(),
                    state,
                    head,
                })
            })
            .collect()
    }

    /// Tag components with semver versions on main.
    pub async fn tag(&self, ws: &mut Workspace, params: &TagParams) -> SnapResult<TagResults> {
        let bump = validate_options(params, self.config.default_release)?;
        let mode = if params.persist {
            Mode::Persist
        } else {
            let explicit = params
                .ver
                .as_deref()
                .map(SemVer::parse)
                .transpose()
                .map_err(|e| SnapError::validation(e.to_string()))?;
            Mode::Tag {
                bump,
                explicit,
                increment_by: params.increment_by,
                ignore_newest: params.ignore_newest_version,
                soft: params.soft,
            }
        };
        self.run(ws, &params.options, mode).await
    }

    /// Snap components on main or the active lane. A snap's label is its
    /// version hash.
    pub async fn snap(&self, ws: &mut Workspace, params: &SnapParams) -> SnapResult<TagResults> {
        self.run(ws, &params.options, Mode::Snap).await
    }

    /// A version's dependencies with `"*"` entries re-resolved against the
    /// current heads.
    pub fn resolved_dependencies(&self, version: &Version) -> SnapResult<Vec<ComponentDependency>> {
        let target = self.observe_target()?;
        version
            .dependencies
            .iter()
            .map(|dep| {
                let spec = version
                    .policy
                    .entries()
                    .find(|(name, _, _)| names_component(name, &dep.id))
                    .map(|(_, spec, _)| spec);
                if spec == Some(DependencyPolicy::ANY) {
                    if let Some(head) = self.head_in(&target, &dep.id)? {
                        let current = self.sources().load_version(&head)?;
                        return Ok(ComponentDependency {
                            version: current.label(&head),
                            ..dep.clone()
                        });
                    }
                }
                Ok(dep.clone())
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Run
    // ---------------------------------------------------------------

    async fn run(
        &self,
        ws: &mut Workspace,
        options: &BatchOptions,
        mode: Mode,
    ) -> SnapResult<TagResults> {
        let target = self.observe_target()?;
        if let (Target::Lane(state), false) = (&target, mode.is_snap()) {
            return Err(SnapError::validation(format!(
                "unable to tag on lane {}: tags are created on main only, snap instead or switch to main",
                state.id()
            )));
        }

        let mut batch = self.select(ws, options, &mode, &target)?;
        if let Mode::Tag {
            bump,
            explicit,
            increment_by,
            ignore_newest,
            ..
        } = &mode
        {
            for candidate in &mut batch {
                candidate.tag = Some(next_tag(
                    &candidate.component,
                    bump,
                    explicit.as_ref(),
                    *increment_by,
                    *ignore_newest,
                )?);
            }
        }
        if !options.skip_auto_tag && !matches!(mode, Mode::Persist) {
            self.add_dependents(&mut batch, &target, &mode)?;
        }

        if let Mode::Tag { soft: true, .. } = mode {
            return Ok(record_soft_tags(ws, &batch));
        }

        for candidate in batch.iter_mut().filter(|c| !c.is_auto()) {
            candidate.policy = self.resolver.resolve_policy(&candidate.id)?;
        }

        let mut results = TagResults::default();
        let statuses = self
            .build(&batch, &batch_edges(&batch), options, &mut results)
            .await?;
        let (batch, statuses): (Vec<Candidate>, Vec<BuildStatus>) = batch
            .into_iter()
            .zip(statuses)
            .filter_map(|(c, status)| status.map(|s| (c, s)))
            .unzip();

        self.commit(ws, &target, options, batch, statuses, &mut results)?;
        Ok(results)
    }

    fn observe_target(&self) -> SnapResult<Target> {
        Ok(match self.lanes.current_lane()? {
            Some(state) => Target::Lane(state),
            None => Target::Main,
        })
    }

    /// The head new work on `id` builds from.
    fn head_in(&self, target: &Target, id: &ComponentId) -> SnapResult<Option<ObjectId>> {
        if let Target::Lane(state) = target {
            if let Some(head) = state.lane.head_of(id) {
                return Ok(Some(head));
            }
        }
        Ok(self.lanes.main_head(id)?)
    }

    fn candidate(
        &self,
        id: &ComponentId,
        files: FileMap,
        target: &Target,
        message: String,
    ) -> SnapResult<Candidate> {
        let (record, component) = match self.sources().get_component(id)? {
            Some((record_id, component)) => (Some(record_id), component),
            None => (None, Component::new(id.clone())),
        };
        let head = self.head_in(target, id)?;
        let previous = head
            .map(|h| self.sources().load_version(&h))
            .transpose()?;
        Ok(Candidate {
            id: component.id.clone(),
            record,
            component,
            parents: head.into_iter().collect(),
            previous,
            files,
            tag: None,
            message,
            policy: DependencyPolicy::default(),
            triggered_by: Vec::new(),
        })
    }

    fn select(
        &self,
        ws: &Workspace,
        options: &BatchOptions,
        mode: &Mode,
        target: &Target,
    ) -> SnapResult<Vec<Candidate>> {
        let message = options.message.clone().unwrap_or_default();
        if let Mode::Persist = mode {
            let mut batch = Vec::new();
            for wc in ws.soft_tagged() {
                let selected = options.ids.iter().any(|id| id.same_component(&wc.id));
                if !options.ids.is_empty() && !selected {
                    continue;
                }
                let Some(soft) = &wc.soft_tag else { continue };
                let message = soft.message.clone().unwrap_or_else(|| message.clone());
                let mut candidate = self.candidate(&wc.id, wc.files.clone(), target, message)?;
                if candidate.component.has_tag(&soft.version) {
                    return Err(SnapError::validation(format!(
                        "version {} of {} already exists",
                        soft.version, candidate.id
                    )));
                }
                candidate.tag = Some(soft.version.clone());
                batch.push(candidate);
            }
            if batch.is_empty() {
                return Err(SnapError::NothingToTag("no soft-tag found".into()));
            }
            return Ok(batch);
        }

        let pool = if options.ids.is_empty() {
            ws.components().collect::<Vec<_>>()
        } else {
            options
                .ids
                .iter()
                .map(|id| {
                    ws.get(id).ok_or_else(|| {
                        SnapError::NotFound(format!(
                            "component {id} is not tracked in the workspace"
                        ))
                    })
                })
                .collect::<SnapResult<Vec<_>>>()?
        };

        let mut batch = Vec::new();
        for wc in pool {
            let candidate = self.candidate(&wc.id, wc.files.clone(), target, message.clone())?;
            let modified = match &candidate.previous {
                Some(previous) => wc.differs_from(previous),
                None => true,
            };
            if modified || options.unmodified {
                batch.push(candidate);
            } else {
                debug!(component = %wc.id, "unchanged, skipped");
            }
        }
        if batch.is_empty() {
            return Err(SnapError::NothingToTag("nothing to tag".into()));
        }
        Ok(batch)
    }

    /// Pull in every component whose head depends on something in the
    /// batch, transitively.
    fn add_dependents(
        &self,
        batch: &mut Vec<Candidate>,
        target: &Target,
        mode: &Mode,
    ) -> SnapResult<()> {
        let mut pool: BTreeMap<String, ComponentId> = self
            .sources()
            .list_components()?
            .into_iter()
            .map(|c| (c.key(), c.id))
            .collect();
        if let Target::Lane(state) = target {
            for id in state.lane.component_ids() {
                pool.entry(id.key()).or_insert_with(|| id.clone());
            }
        }

        loop {
            let mut added = false;
            for id in pool.values() {
                if batch.iter().any(|c| c.id.same_component(id)) {
                    continue;
                }
                let Some(head) = self.head_in(target, id)? else {
                    continue;
                };
                let version = self.sources().load_version(&head)?;
                let triggered_by: Vec<ComponentId> = batch
                    .iter()
                    .filter(|c| version.dependency(&c.id).is_some())
                    .map(|c| c.id.clone())
                    .collect();
                if triggered_by.is_empty() {
                    continue;
                }

                let files = self.sources().read_files(&version)?;
                let mut candidate = self.candidate(id, files, target, AUTO_TAG_MESSAGE.into())?;
                candidate.policy = version.policy.clone();
                if let Mode::Tag {
                    bump,
                    explicit,
                    increment_by,
                    ..
                } = mode
                {
                    let bump = match explicit {
                        Some(_) => ReleaseBump {
                            release: ReleaseType::Patch,
                            pre_id: None,
                        },
                        None => bump.clone(),
                    };
                    let tag = next_tag(&candidate.component, &bump, None, *increment_by, false)?;
                    candidate.tag = Some(tag);
                }
                debug!(component = %id, triggers = triggered_by.len(), "auto-tagging dependent");
                candidate.triggered_by = triggered_by;
                batch.push(candidate);
                added = true;
            }
            if !added {
                return Ok(());
            }
        }
    }

    // ---------------------------------------------------------------
    // Build
    // ---------------------------------------------------------------

    /// Run the build pipeline if asked to. Returns a status per candidate;
    /// `None` drops the candidate from the batch.
    async fn build(
        &self,
        batch: &[Candidate],
        edges: &[Vec<usize>],
        options: &BatchOptions,
        results: &mut TagResults,
    ) -> SnapResult<Vec<Option<BuildStatus>>> {
        let n = batch.len();
        if !options.build.unwrap_or(self.config.build_by_default) {
            return Ok(vec![Some(BuildStatus::Pending); n]);
        }
        let Some(pipeline) = &self.pipeline else {
            results
                .warnings
                .push("build requested but no build pipeline is configured".into());
            return Ok(vec![Some(BuildStatus::Skipped); n]);
        };

        let ids: Vec<ComponentId> = batch.iter().map(|c| c.id.clone()).collect();
        let build_options = BuildOptions {
            skip_tests: options.skip_tests || self.config.skip_tests,
            skip_tasks: options.skip_tasks.clone(),
            fail_fast: options.fail_fast,
        };
        let timeout = self.config.build_timeout;
        let build = pipeline.run_build(&ids, &build_options);
        let result = match tokio::time::timeout(timeout, build).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(?timeout, components = n, "build timed out");
                return Err(SnapError::BuildFailed(format!("build timed out after {timeout:?}")));
            }
        };
        if result.success {
            return Ok(vec![Some(BuildStatus::Succeeded); n]);
        }

        let failed_ids = result.failed_components();
        let mut failed: Vec<bool> = batch
            .iter()
            .map(|c| failed_ids.iter().any(|f| f.same_component(&c.id)))
            .collect();
        if !failed.contains(&true) {
            failed = vec![true; n];
        }
        let failed_names = || {
            batch
                .iter()
                .zip(&failed)
                .filter(|(_, f)| **f)
                .map(|(c, _)| c.id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        if options.ignore_build_errors {
            results.warnings.push(format!(
                "build failed for {}; versioned with build status failed",
                failed_names()
            ));
            return Ok(failed
                .iter()
                .map(|f| Some(if *f { BuildStatus::Failed } else { BuildStatus::Succeeded }))
                .collect());
        }
        if options.fail_fast {
            return Err(SnapError::BuildFailed(failed_names()));
        }

        let groups = connected_groups(edges);
        let bad: BTreeSet<usize> = (0..n).filter(|i| failed[*i]).map(|i| groups[i]).collect();
        let mut statuses = Vec::with_capacity(n);
        for (i, candidate) in batch.iter().enumerate() {
            if bad.contains(&groups[i]) {
                let reason = if failed[i] {
                    result
                        .error_for(&candidate.id)
                        .unwrap_or_else(|| "build failed".into())
                } else {
                    "dropped: a component it is connected to failed to build".into()
                };
                results.failed.push(FailedComponent {
                    id: candidate.id.clone(),
                    reason,
                });
                statuses.push(None);
            } else {
                statuses.push(Some(BuildStatus::Succeeded));
            }
        }
        if statuses.iter().all(Option::is_none) {
            return Err(SnapError::BuildFailed(failed_names()));
        }
        warn!(dropped = results.failed.len(), "build failures dropped part of the batch");
        Ok(statuses)
    }

    // ---------------------------------------------------------------
    // Persist
    // ---------------------------------------------------------------

    fn commit(
        &self,
        ws: &mut Workspace,
        target: &Target,
        options: &BatchOptions,
        batch: Vec<Candidate>,
        statuses: Vec<BuildStatus>,
        results: &mut TagResults,
    ) -> SnapResult<()> {
        let edges = batch_edges(&batch);
        let mut labels: Vec<Option<String>> = vec![None; batch.len()];
        let mut versions: Vec<Option<(ObjectId, Version)>> = vec![None; batch.len()];
        let mut staged = StagedCommit::new();

        for i in topo_order(&edges) {
            let candidate = &batch[i];
            let dependencies = self.resolve_dependencies(candidate, &batch, &labels, target)?;
            let sequence = self
                .sources()
                .next_sequence(&candidate.component, &candidate.parents)?;
            let version = Version {
                component: candidate.id.clone(),
                sequence,
                tag: candidate.tag.clone(),
                parents: candidate.parents.clone(),
                files: candidate
                    .files
                    .iter()
                    .map(|(path, content)| {
                        let source = Source::new(content.clone());
                        let id = staged.stage(source.to_stored_object());
                        (path.clone(), id)
                    })
                    .collect(),
                dependencies,
                policy: candidate.policy.clone(),
                log: LogEntry::new(candidate.message.clone(), self.config.author.clone()),
                build_status: statuses[i],
                extensions: candidate
                    .previous
                    .as_ref()
                    .map(|p| p.extensions.clone())
                    .unwrap_or_default(),
            };
            let version_id = staged.stage(version.to_stored_object()?);
            labels[i] = Some(version.label(&version_id));
            versions[i] = Some((version_id, version));
        }

        let mut rendered = Vec::with_capacity(batch.len());
        let mut lane_next = match target {
            Target::Lane(state) => Some(state.lane.next_state(LogEntry::new(
                options.message.clone().unwrap_or_default(),
                self.config.author.clone(),
            ))),
            Target::Main => None,
        };
        for (candidate, built) in batch.iter().zip(&versions) {
            let Some((version_id, version)) = built else { continue };
            match lane_next.as_mut() {
                Some(next) => {
                    next.set_head(candidate.id.clone(), *version_id);
                    if candidate.record.is_none() {
                        let record = staged.stage(candidate.component.to_stored_object()?);
                        let name = component_ref(&candidate.id);
                        staged.update_ref(RefUpdate::swap(name, None, record));
                    }
                }
                None => {
                    let next = candidate
                        .component
                        .advance(*version_id, version.sequence, candidate.tag.clone());
                    let record = staged.stage(next.to_stored_object()?);
                    staged.update_ref(RefUpdate::swap(
                        component_ref(&candidate.id),
                        candidate.record,
                        record,
                    ));
                }
            }
            rendered.push(format!("{}@{}", candidate.id, version.label(version_id)));
        }
        if let (Target::Lane(state), Some(next)) = (target, &lane_next) {
            self.lanes
                .record_snap(&mut staged, state, next, rendered, options.message.as_deref())?;
        }

        staged.commit(self.sources().objects(), self.sources().refs())?;

        for (candidate, built) in batch.iter().zip(versions) {
            let Some((version_id, version)) = built else { continue };
            let tagged = TaggedComponent {
                id: candidate.id.clone(),
                version_id: Some(version_id),
                label: version.label(&version_id),
            };
            if candidate.previous.is_none() {
                results.new_components.push(candidate.id.clone());
            }
            if candidate.is_auto() {
                results.auto_tagged.push(AutoTagged {
                    component: tagged,
                    triggered_by: candidate.triggered_by.clone(),
                });
            } else {
                results.tagged.push(tagged);
            }
            ws.clear_soft_tag(&candidate.id);
        }

        let target_name = match target {
            Target::Main => "main".to_string(),
            Target::Lane(state) => state.id().to_string(),
        };
        info!(
            target = %target_name,
            tagged = results.tagged.len(),
            auto_tagged = results.auto_tagged.len(),
            failed = results.failed.len(),
            "versions committed"
        );
        Ok(())
    }

    fn resolve_dependencies(
        &self,
        candidate: &Candidate,
        batch: &[Candidate],
        labels: &[Option<String>],
        target: &Target,
    ) -> SnapResult<Vec<ComponentDependency>> {
        let mut dependencies = Vec::new();
        for (name, spec, lifecycle) in candidate.policy.entries() {
            let in_batch = batch.iter().position(|c| names_component(name, &c.id));
            let id = match in_batch {
                Some(j) => batch[j].id.clone(),
                None => match ComponentId::parse(name) {
                    Ok(parsed) => match self.known_component(&parsed, target)? {
                        Some(id) => id,
                        None => continue,
                    },
                    Err(_) => continue,
                },
            };
            let pinned_by_batch = candidate.is_auto() && in_batch.is_some();
            let version = if DependencyPolicy::is_marker(spec) || pinned_by_batch {
                self.resolve_marker(candidate, &id, in_batch, batch, labels, target)?
                    .ok_or_else(|| {
                        SnapError::NotFound(format!(
                            "no version of {id} to resolve \"{spec}\" for {}",
                            candidate.id
                        ))
                    })?
            } else {
                spec.to_string()
            };
            dependencies.push(ComponentDependency {
                id,
                version,
                lifecycle,
            });
        }
        Ok(dependencies)
    }

    /// Batch version, then current head, then the previous version's choice.
    fn resolve_marker(
        &self,
        candidate: &Candidate,
        dep: &ComponentId,
        in_batch: Option<usize>,
        batch: &[Candidate],
        labels: &[Option<String>],
        target: &Target,
    ) -> SnapResult<Option<String>> {
        if let Some(j) = in_batch {
            if let Some(label) = &labels[j] {
                return Ok(Some(label.clone()));
            }
            if let Some(tag) = &batch[j].tag {
                return Ok(Some(tag.to_string()));
            }
        }
        if let Some(head) = self.head_in(target, dep)? {
            let version = self.sources().load_version(&head)?;
            return Ok(Some(version.label(&head)));
        }
        Ok(candidate
            .previous
            .as_ref()
            .and_then(|p| p.dependency(dep))
            .map(|d| d.version.clone()))
    }

    fn known_component(
        &self,
        id: &ComponentId,
        target: &Target,
    ) -> SnapResult<Option<ComponentId>> {
        if let Some((_, component)) = self.sources().get_component(id)? {
            return Ok(Some(component.id));
        }
        if let Target::Lane(state) = target {
            if let Some(entry) = state.lane.components.get(&id.key()) {
                return Ok(Some(entry.id.clone()));
            }
        }
        Ok(None)
    }
}

fn record_soft_tags(ws: &mut Workspace, batch: &[Candidate]) -> TagResults {
    let mut results = TagResults {
        is_soft_tag: true,
        ..Default::default()
    };
    for candidate in batch {
        let Some(version) = candidate.tag.clone() else { continue };
        if ws.get(&candidate.id).is_none() {
            ws.track(candidate.id.clone(), candidate.files.clone());
        }
        let message = Some(candidate.message.clone()).filter(|m| !m.is_empty());
        ws.set_soft_tag(&candidate.id, SoftTag {
            version: version.clone(),
            message,
        });
        let tagged = TaggedComponent {
            id: candidate.id.clone(),
            version_id: None,
            label: version.to_string(),
        };
        if candidate.is_auto() {
            results.auto_tagged.push(AutoTagged {
                component: tagged,
                triggered_by: candidate.triggered_by.clone(),
            });
        } else {
            results.tagged.push(tagged);
        }
    }
    info!(components = batch.len(), "soft-tagged");
    results
}

/// The next tag of `component`: `explicit`, or its latest tag bumped.
fn next_tag(
    component: &Component,
    bump: &ReleaseBump,
    explicit: Option<&SemVer>,
    increment_by: u32,
    ignore_newest: bool,
) -> SnapResult<SemVer> {
    let latest = component.latest_tag().map(|(v, _)| v.clone());
    let version = match explicit {
        Some(v) => {
            if let Some(latest) = &latest {
                if v < latest && !ignore_newest {
                    return Err(SnapError::validation(format!(
                        "{}: version {v} is lower than the newest version {latest}",
                        component.id
                    )));
                }
            }
            v.clone()
        }
        None => latest
            .unwrap_or_else(SemVer::zero)
            .bump_by(bump.release, increment_by, bump.pre_id.as_deref())?,
    };
    if component.has_tag(&version) {
        return Err(SnapError::validation(format!(
            "version {version} of {} already exists",
            component.id
        )));
    }
    Ok(version)
}

/// Whether a policy entry name refers to `id`.
fn names_component(name: &str, id: &ComponentId) -> bool {
    name == id.key() || name == id.to_string()
}

/// For each candidate, the batch members it depends on.
fn batch_edges(batch: &[Candidate]) -> Vec<Vec<usize>> {
    batch
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let mut deps = BTreeSet::new();
            for (name, _, _) in candidate.policy.entries() {
                if let Some(j) = batch.iter().position(|c| names_component(name, &c.id)) {
                    deps.insert(j);
                }
            }
            for trigger in &candidate.triggered_by {
                if let Some(j) = batch.iter().position(|c| c.id.same_component(trigger)) {
                    deps.insert(j);
                }
            }
            deps.remove(&i);
            deps.into_iter().collect()
        })
        .collect()
}

/// Dependencies before dependents. Members of a cycle follow in batch order.
fn topo_order(edges: &[Vec<usize>]) -> Vec<usize> {
    let n = edges.len();
    let mut done = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let ready = (0..n).find(|&i| !done[i] && edges[i].iter().all(|&j| done[j]));
        let Some(i) = ready.or_else(|| (0..n).find(|&i| !done[i])) else {
            break;
        };
        done[i] = true;
        order.push(i);
    }
    order
}

/// Group label per candidate; candidates linked by a dependency share one.
fn connected_groups(edges: &[Vec<usize>]) -> Vec<usize> {
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    let mut parent: Vec<usize> = (0..edges.len()).collect();
    for (i, deps) in edges.iter().enumerate() {
        for &j in deps {
            let (a, b) = (find(&mut parent, i), find(&mut parent, j));
            if a != b {
                parent[a] = b;
            }
        }
    }
    (0..edges.len()).map(|i| find(&mut parent, i)).collect()
}
