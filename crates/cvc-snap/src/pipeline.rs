//! Collaborators the engine calls out to: dependency policy resolution and
//! the build pipeline.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use cvc_model::DependencyPolicy;
use cvc_types::ComponentId;
use serde::{Deserialize, Serialize};

use crate::error::SnapResult;

/// Supplies the dependency policy of a component being versioned.
///
/// The policy is stored verbatim on the new version, `"+"` and `"*"` markers
/// included; the engine resolves entries that name known components.
pub trait DependencyResolver: Send + Sync {
    fn resolve_policy(&self, id: &ComponentId) -> SnapResult<DependencyPolicy>;
}

/// A resolver backed by a fixed table. Components without an entry get an
/// empty policy.
#[derive(Debug, Default)]
pub struct StaticResolver {
    policies: RwLock<BTreeMap<String, DependencyPolicy>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_policy(&self, id: &ComponentId, policy: DependencyPolicy) {
        self.policies
            .write()
            .expect("lock poisoned")
            .insert(id.key(), policy);
    }

    /// Add a runtime dependency entry to `id`'s policy.
    pub fn add_dependency(
        &self,
        id: &ComponentId,
        name: impl Into<String>,
        spec: impl Into<String>,
    ) {
        self.policies
            .write()
            .expect("lock poisoned")
            .entry(id.key())
            .or_default()
            .dependencies
            .insert(name.into(), spec.into());
    }
}

impl DependencyResolver for StaticResolver {
    fn resolve_policy(&self, id: &ComponentId) -> SnapResult<DependencyPolicy> {
        Ok(self
            .policies
            .read()
            .expect("lock poisoned")
            .get(&id.key())
            .cloned()
            .unwrap_or_default())
    }
}

/// Options passed to a build run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    pub skip_tests: bool,
    pub skip_tasks: Vec<String>,
    pub fail_fast: bool,
}

/// Outcome of one build task for one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub component: ComponentId,
    pub task: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a build run over a component set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    pub tasks: Vec<TaskResult>,
}

impl BuildResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            tasks: Vec::new(),
        }
    }

    /// Components with at least one failed task, in task order.
    pub fn failed_components(&self) -> Vec<ComponentId> {
        let mut failed: Vec<ComponentId> = Vec::new();
        for task in self.tasks.iter().filter(|t| !t.success) {
            if !failed.iter().any(|c| c.same_component(&task.component)) {
                failed.push(task.component.clone());
            }
        }
        failed
    }

    /// First failure message recorded for `id`.
    pub fn error_for(&self, id: &ComponentId) -> Option<String> {
        self.tasks
            .iter()
            .find(|t| !t.success && t.component.same_component(id))
            .map(|t| t.error.clone().unwrap_or_else(|| format!("task {} failed", t.task)))
    }
}

/// Runs compile/test/build tasks for a set of components.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    async fn run_build(&self, ids: &[ComponentId], options: &BuildOptions)
        -> SnapResult<BuildResult>;
}
